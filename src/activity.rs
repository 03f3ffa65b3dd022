//! Activity kind registry.
//!
//! Characterization activities recorded on a hand-off chain are tagged with
//! a short kind name ("EDX", "XRD", ...). Each kind maps to a process class
//! IRI in the domain ontology; workflow model steps reference activities by
//! kind, and the registry is the single source of truth for which kinds
//! exist. Anything outside the registry is an `UnknownActivityKind` error
//! at spec-build time.

use crate::error::{Error, Result};

const CRC_PREFIX: &str = "https://crc1625.mdi.ruhr-uni-bochum.de/";
const PMDCO_PREFIX: &str = "https://w3id.org/pmd/co/";

/// All registered activity kinds, paired with the local name of their
/// process class. "Others" is the catch-all for analysing processes that
/// have no dedicated class.
const REGISTRY: &[(&str, &str)] = &[
    ("Annealing", "AnnealingProcess"),
    ("APT", "APTProcess"),
    ("Bandgap", "BandgapProcess"),
    ("EDX", "EDXMicroscopyProcess"),
    ("FIM", "FIMProcess"),
    ("LEIS", "LEISProcess"),
    ("Photo", "PhotoProcess"),
    ("PSM", "PSMProcess"),
    ("Report", "ReportProcess"),
    ("Resistance", "ResistanceProcess"),
    ("SDC", "SDCProcess"),
    ("SECCM", "SECCMProcess"),
    ("SEM", "SEMProcess"),
    ("TEM", "TEMProcess"),
    ("Thickness", "ThicknessProcess"),
    ("XPS", "XPSProcess"),
    ("XRD", "XRDProcess"),
    ("Others", "AnalysingProcess"),
];

/// Check whether an activity kind is registered.
pub fn is_known(kind: &str) -> bool {
    REGISTRY.iter().any(|(k, _)| *k == kind)
}

/// Validate an activity kind, returning it on success.
pub fn require_known(kind: &str) -> Result<&str> {
    if is_known(kind) {
        Ok(kind)
    } else {
        Err(Error::UnknownActivityKind(kind.to_string()))
    }
}

/// All registered kind names, in registry order.
pub fn known_kinds() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(k, _)| *k)
}

/// Full process class IRI for an activity kind.
///
/// "Others" lives in the PMD core ontology; every dedicated process class
/// lives in the project ontology.
pub fn class_iri(kind: &str) -> Result<String> {
    let (_, class) = REGISTRY
        .iter()
        .find(|(k, _)| *k == kind)
        .ok_or_else(|| Error::UnknownActivityKind(kind.to_string()))?;
    let prefix = if kind == "Others" { PMDCO_PREFIX } else { CRC_PREFIX };
    Ok(format!("{}{}", prefix, class))
}

/// Prefixed (CURIE) form of the process class, as used inside shape
/// documents.
pub fn class_curie(kind: &str) -> Result<String> {
    let (_, class) = REGISTRY
        .iter()
        .find(|(k, _)| *k == kind)
        .ok_or_else(|| Error::UnknownActivityKind(kind.to_string()))?;
    let prefix = if kind == "Others" { "pmdco:" } else { ":" };
    Ok(format!("{}{}", prefix, class))
}

/// Reverse lookup: activity kind for a process class IRI. Unrecognized
/// IRIs fall back to "Others", matching how the store classifies generic
/// analysing processes.
pub fn kind_for_class_iri(iri: &str) -> &'static str {
    REGISTRY
        .iter()
        .find(|(kind, class)| {
            let prefix = if *kind == "Others" { PMDCO_PREFIX } else { CRC_PREFIX };
            iri == format!("{}{}", prefix, class)
        })
        .map(|(kind, _)| *kind)
        .unwrap_or("Others")
}
