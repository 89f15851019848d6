// Atlas Module
// Skyline packing, per-image placement records and the deferred upload queue
// backing a single growable atlas surface.

pub mod handle;
pub mod lookup;
pub mod skyline;
pub mod upload;

pub use handle::{BatcherId, Handle, ImageKey};
pub use lookup::{HandleTable, PlacementRecord};
pub use skyline::{Segment, SkylineAllocator};
pub use upload::{PendingUpload, UploadQueue};
