#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # edi-validation
//!
//! Validation of parsed interchanges against trading partner profiles.
//!
//! Checks run in a fixed order:
//!
//! 1. envelope integrity (control numbers and counts, expected sender, receiver and version)
//! 2. transaction set recognition
//! 3. partner rules (required references, date layout, carrier SCAC)
//!
//! Validation is pure and never fails; every finding is an [`Issue`](edi_ir::Issue).
//!
//! ## Example Usage
//!
//! ```rust
//! use edi_adapter_x12::{ParseOptions, parse};
//! use edi_profile::PartnerProfile;
//!
//! let data = "ISA*00*          *00*          *ZZ*ACME           *ZZ*CARRIER        *240115*1030*U*00401*000000001*0*P*>~\
//! GS*SM*ACME*CARRIER*20240115*1030*1*X*004010~ST*204*0001~B2**ACME**SHIP1**PP~SE*3*0001~GE*1*1~IEA*1*000000001~";
//! let (interchange, _) = parse(data.as_bytes(), &ParseOptions::default());
//!
//! let mut profile = PartnerProfile::new("ACME", "Acme Logistics");
//! profile.configuration.transaction_sets = vec!["204".to_string()];
//!
//! let issues = edi_validation::validate(&interchange.unwrap(), &profile);
//! assert!(issues.is_empty());
//! ```

pub mod engine;
pub mod reporter;
pub mod rules;

pub use engine::ValidationEngine;
pub use reporter::ValidationReport;

use edi_ir::{Interchange, Issue};
use edi_profile::PartnerProfile;

/// Validate an interchange with a partner profile.
pub fn validate(interchange: &Interchange, profile: &PartnerProfile) -> Vec<Issue> {
    ValidationEngine::new(profile).validate(interchange)
}
