//! Scanline design-rule cleaner for Manhattan layouts
//!
//! Repairs minimum-width and minimum-space violations on a layer by
//! rasterising its edges into scanlines, fusing or deleting offending runs on
//! rows and columns alternately, and rebuilding closed polygons from the
//! result.
//!
//! # Example
//! ```
//! use slcleaner::clean::ScanlineStore;
//!
//! let mut store = ScanlineStore::from_extent(0, 100, 0, 100, 10, 10)?;
//! store.add_box(0, 0, 40, 20)?;
//! store.add_box(43, 0, 100, 20)?;
//! store.sortlist();
//! store.clean(10);
//! assert_eq!(store.get_vect(5)?, vec![0, 100]);
//! assert_eq!(store.get_polygons().len(), 1);
//! # Ok::<(), slcleaner::clean::CleanError>(())
//! ```

pub mod clean;
pub mod config;
pub mod job;
pub mod logging;
pub mod server;
