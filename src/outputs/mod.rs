//! Persistence of scraped buckets.
//!
//! - [`json`]: Writes each (year, month) bucket as one JSON array and reads
//!   persisted batches back for inspection and loading
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── articles_2024_02.json
//! ├── articles_2024_01.json
//! └── ...
//! ```

pub mod json;
