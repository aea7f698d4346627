//! Output generation for the two digest files written per run.
//!
//! # Submodules
//!
//! - [`digest`]: Renders the raw digest and writes both digest files
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── output_20250505-20250511.txt            # RawDigest
//! └── output_20250505-20250511_formatted.txt  # FormattedDigest
//! ```

pub mod digest;
