//! Trusted list URIs and classification sets
//!
//! Classification sets are built once on first use and shared by every
//! parser instance.

use std::collections::HashSet;
use std::sync::LazyLock;

/// TSLType of the list of the lists (scheme root)
pub const LIST_OF_THE_LISTS_TYPE: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/TSLType/EUlistofthelists";
/// TSLType of a territory trusted list
pub const GENERIC_TYPE: &str = "http://uri.etsi.org/TrstSvc/TrustedList/TSLType/EUgeneric";

/// Service status URIs
pub const STATUS_GRANTED: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/granted";
pub const STATUS_WITHDRAWN: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/withdrawn";
pub const STATUS_RECOGNISED: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/recognisedatnationallevel";
pub const STATUS_DEPRECATED: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/deprecatedatnationallevel";
pub const STATUS_UNDER_SUPERVISION: &str =
    "http://uri.etsi.org/TrstSvc/eSigDir-1999-93-EC-TrustedList/Svcstatus/undersupervision";
pub const STATUS_SUPERVISION_IN_CESSATION: &str =
    "http://uri.etsi.org/TrstSvc/eSigDir-1999-93-EC-TrustedList/Svcstatus/supervisionincessation";
pub const STATUS_SUPERVISION_CEASED: &str =
    "http://uri.etsi.org/TrstSvc/eSigDir-1999-93-EC-TrustedList/Svcstatus/supervisionceased";
pub const STATUS_SUPERVISION_REVOKED: &str =
    "http://uri.etsi.org/TrstSvc/eSigDir-1999-93-EC-TrustedList/Svcstatus/supervisionrevoked";
pub const STATUS_ACCREDITED: &str =
    "http://uri.etsi.org/TrstSvc/eSigDir-1999-93-EC-TrustedList/Svcstatus/accredited";
pub const STATUS_ACCREDITATION_CEASED: &str =
    "http://uri.etsi.org/TrstSvc/eSigDir-1999-93-EC-TrustedList/Svcstatus/accreditationceased";
pub const STATUS_ACCREDITATION_REVOKED: &str =
    "http://uri.etsi.org/TrstSvc/eSigDir-1999-93-EC-TrustedList/Svcstatus/accreditationrevoked";

/// Service type URIs
pub const SERVICE_TYPE_CA_QC: &str = "http://uri.etsi.org/TrstSvc/Svctype/CA/QC";
pub const SERVICE_TYPE_NATIONAL_ROOT_CA_QC: &str =
    "http://uri.etsi.org/TrstSvc/Svctype/NationalRootCA-QC";
pub const SERVICE_TYPE_OCSP_QC: &str = "http://uri.etsi.org/TrstSvc/Svctype/Certstatus/OCSP/QC";
pub const SERVICE_TYPE_CRL_QC: &str = "http://uri.etsi.org/TrstSvc/Svctype/Certstatus/CRL/QC";
pub const SERVICE_TYPE_TSA_QTST: &str = "http://uri.etsi.org/TrstSvc/Svctype/TSA/QTST";
pub const SERVICE_TYPE_TSA_TSS_QC: &str = "http://uri.etsi.org/TrstSvc/Svctype/TSA/TSS-QC";
pub const SERVICE_TYPE_TSA_TSS_ADES: &str =
    "http://uri.etsi.org/TrstSvc/Svctype/TSA/TSS-AdESQCandQES";
pub const SERVICE_TYPE_TSA: &str = "http://uri.etsi.org/TrstSvc/Svctype/TSA";

/// Marker identifying pivot documents among the scheme information URIs
pub const PIVOT_MARKER: &str = "pivot";

/// Preferred language for operator and service names
pub const PREFERRED_LANGUAGE: &str = "en";

/// Extension of the published digest next to a trusted list
pub const DIGEST_EXTENSION: &str = "sha2";

/// Sidecar extension holding the conditional fetch token
pub const ETAG_SIDECAR_EXTENSION: &str = "etag.json";

/// Default bound on the pivot chain walk
pub const DEFAULT_MAX_PIVOT_DEPTH: u32 = 3;

/// TSLType values of scheme roots (lists of lists)
pub static SCHEMES_URI: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| HashSet::from([LIST_OF_THE_LISTS_TYPE]));

/// TSLType values of territory lists reachable through generic pointers
pub static GENERIC_URI: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| HashSet::from([GENERIC_TYPE]));

/// Statuses that open an active window
pub static SERVICESTATUS_START: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        STATUS_GRANTED,
        STATUS_RECOGNISED,
        STATUS_UNDER_SUPERVISION,
        STATUS_SUPERVISION_IN_CESSATION,
        STATUS_ACCREDITED,
    ])
});

/// Statuses that open a withdrawn window
pub static SERVICESTATUS_END: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        STATUS_WITHDRAWN,
        STATUS_DEPRECATED,
        STATUS_SUPERVISION_CEASED,
        STATUS_SUPERVISION_REVOKED,
        STATUS_ACCREDITATION_CEASED,
        STATUS_ACCREDITATION_REVOKED,
    ])
});

/// Service types materialised into `Service` records
pub static SERVICES_SUPPORTED: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        SERVICE_TYPE_CA_QC,
        SERVICE_TYPE_NATIONAL_ROOT_CA_QC,
        SERVICE_TYPE_OCSP_QC,
        SERVICE_TYPE_CRL_QC,
        SERVICE_TYPE_TSA_QTST,
        SERVICE_TYPE_TSA_TSS_QC,
        SERVICE_TYPE_TSA_TSS_ADES,
        SERVICE_TYPE_TSA,
    ])
});

/// Territory codes published in the EU list of the lists
pub static RECOGNIZED_TERRITORIES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "EL", "ES", "EU", "FI", "FR", "HR", "HU",
        "IE", "IS", "IT", "LI", "LT", "LU", "LV", "MT", "NL", "NO", "PL", "PT", "RO", "SE", "SI",
        "SK", "UK",
    ])
});
