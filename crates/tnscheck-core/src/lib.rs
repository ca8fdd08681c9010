pub mod coherence;
pub mod compare;
pub mod descriptor;
pub mod error;
pub mod record;

pub use coherence::{Verdict, check_host_naming, check_service_naming};
pub use compare::{Match, ResolvedIdentity, compare_scan_names};
pub use descriptor::{Address, AddressRole, ConnectDescriptor, parse};
pub use error::{ErrorKind, ResolveError};
pub use record::{
    CoherenceReport, Comparison, EvaluationResult, InputRecord, Side, SideResult, SideSource,
};
