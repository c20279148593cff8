//! Progress derivation: output parsing and directory-size estimation.

mod parser;
mod probe;

pub use parser::{DOWNLOADING_STATUS, parse_chunk, unit_multiplier};
pub use probe::{
    DirectorySizeProbe, MAX_QUIET_TICKS, PERCENT_CEILING, PROBE_INTERVAL, ProbeState,
    directory_size, estimate_percentage,
};
