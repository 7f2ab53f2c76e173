//! Convenience re-exports for downstream consumers and tests, mirroring the
//! flat `use imgcore::prelude::*;` style this crate's tests are written
//! against.

pub use crate::filter::Filter;
pub use crate::limits::{Limits, OpenOptions};
pub use crate::registry::{FormatKind, Registry};
pub use crate::toc::{FullToc, TocEntry};
pub use crate::types::{
    ByteAddressableImage, Geometry, Image, ImageInfo, MediaTagKind, MediaTagSet, MediaType, OpticalImage, Partition,
    SectorTagKind, SectorTagSet, SectorType, Session, Track, TrackSubchannelType, XmlMediaType,
};
pub use crate::{ExitClass, ImgError};
