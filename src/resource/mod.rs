//! Read-only views over RCDATA resources embedded in a loaded image.
//!
//! A [`ResourceView`] borrows the bytes of one raw-data resource straight
//! from the image that holds it. Nothing is copied: the view is a pointer
//! and a length, and the borrow checker ties it to the image's lifetime.
//!
//! Resolution follows the four steps of the Win32 resource API (find, load,
//! lock, size). Each step that fails produces a [`ResourceAccessError`]
//! carrying the platform error code reported for that step.

pub mod image;
pub mod source;
#[cfg(windows)]
pub mod win32;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

pub use crate::formats::pe::directories::ResourceKey;
pub use image::{current_image, open_image, CurrentImage, ImageError};
pub use source::ResourceSource;

/// Identifies one resource in the RCDATA category of an image.
///
/// Text of the form `#123` denotes integer ID 123, as with `MAKEINTRESOURCE`
/// and the `"#123"` convention accepted by `FindResource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Id(u16),
    Name(String),
}

impl ResourceId {
    /// Lookup key for this identifier, folding `#123` names into IDs.
    pub fn key(&self) -> ResourceKey<'_> {
        match self {
            ResourceId::Id(id) => ResourceKey::Id(*id),
            ResourceId::Name(name) => match parse_numeric(name) {
                Some(id) => ResourceKey::Id(id),
                None => ResourceKey::Name(name),
            },
        }
    }
}

fn parse_numeric(name: &str) -> Option<u16> {
    name.strip_prefix('#')
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

impl From<u16> for ResourceId {
    fn from(id: u16) -> Self {
        ResourceId::Id(id)
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        match parse_numeric(name) {
            Some(id) => ResourceId::Id(id),
            None => ResourceId::Name(name.to_string()),
        }
    }
}

impl FromStr for ResourceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ResourceId::from(s))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Id(id) => write!(f, "#{}", id),
            ResourceId::Name(name) => f.write_str(name),
        }
    }
}

/// Which resolution step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceErrorKind {
    /// No resource with that identifier in the RCDATA category
    NotFound,
    /// Metadata found but the backing data could not be obtained
    LoadFailed,
    /// Backing data obtained but its address could not be
    LockFailed,
    /// The size query returned 0
    SizeZero,
}

impl fmt::Display for ResourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ResourceErrorKind::NotFound => "Cannot find the resource",
            ResourceErrorKind::LoadFailed => "Cannot load the resource",
            ResourceErrorKind::LockFailed => "Cannot access the resource's bytes",
            ResourceErrorKind::SizeZero => "Cannot get the resource size",
        };
        f.write_str(message)
    }
}

/// Failure to resolve a resource, with the platform error code of the failed step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} {id} (error code {code})")]
pub struct ResourceAccessError {
    pub kind: ResourceErrorKind,
    pub id: ResourceId,
    pub code: u32,
}

impl ResourceAccessError {
    pub fn new(kind: ResourceErrorKind, id: &ResourceId, code: u32) -> Self {
        Self {
            kind,
            id: id.clone(),
            code,
        }
    }
}

/// A read-only, zero-copy view of one RCDATA resource.
///
/// The default view is empty: a null pointer, a size of 0 and an empty
/// iteration. A resolved view always has a non-null pointer and a size
/// greater than zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceView<'img> {
    bytes: Option<&'img [u8]>,
}

impl<'img> ResourceView<'img> {
    /// An empty view.
    pub const fn empty() -> Self {
        Self { bytes: None }
    }

    /// Resolve `id` in `image`.
    pub fn open<S>(id: &ResourceId, image: &'img S) -> Result<Self, ResourceAccessError>
    where
        S: ResourceSource + ?Sized,
    {
        let mut view = Self::empty();
        view.reset(id, image)?;
        Ok(view)
    }

    /// Re-point the view at `id` in `image`.
    ///
    /// On failure the view is left empty.
    pub fn reset<S>(&mut self, id: &ResourceId, image: &'img S) -> Result<(), ResourceAccessError>
    where
        S: ResourceSource + ?Sized,
    {
        self.clear();

        debug!(resource = %id, "Resolving resource");
        match resolve(id, image) {
            Ok(bytes) => {
                debug!(resource = %id, size = bytes.len(), "Resource resolved");
                self.bytes = Some(bytes);
                Ok(())
            }
            Err(err) => {
                warn!(
                    resource = %id,
                    kind = ?err.kind,
                    code = err.code,
                    "Resource resolution failed"
                );
                Err(err)
            }
        }
    }

    /// Return to the empty state.
    pub fn clear(&mut self) {
        self.bytes = None;
    }

    /// Address of the first byte, or null for an empty view.
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.map_or(std::ptr::null(), <[u8]>::as_ptr)
    }

    /// Length in bytes; 0 for an empty view.
    pub fn size(&self) -> usize {
        self.bytes.map_or(0, <[u8]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_none()
    }

    /// The resource bytes, borrowed from the image.
    pub fn as_bytes(&self) -> &'img [u8] {
        self.bytes.unwrap_or(&[])
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'img, u8>> {
        self.as_bytes().iter().copied()
    }
}

impl ResourceView<'static> {
    /// Resolve `id` in the image of the running process.
    ///
    /// See [`current_image`] for how that image is chosen.
    pub fn open_current(id: &ResourceId) -> Result<Self, crate::ExtractError> {
        let image = current_image()?;
        Ok(ResourceView::open(id, image)?)
    }
}

impl AsRef<[u8]> for ResourceView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<'img> IntoIterator for ResourceView<'img> {
    type Item = u8;
    type IntoIter = std::iter::Copied<std::slice::Iter<'img, u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'img> IntoIterator for &ResourceView<'img> {
    type Item = u8;
    type IntoIter = std::iter::Copied<std::slice::Iter<'img, u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn resolve<'img, S>(id: &ResourceId, image: &'img S) -> Result<&'img [u8], ResourceAccessError>
where
    S: ResourceSource + ?Sized,
{
    use ResourceErrorKind::*;

    let info = image
        .find(id.key())
        .map_err(|code| ResourceAccessError::new(NotFound, id, code))?;
    trace!(resource = %id, "find ok");

    let data = image
        .load(info)
        .map_err(|code| ResourceAccessError::new(LoadFailed, id, code))?;
    trace!(resource = %id, "load ok");

    let ptr = image
        .lock(data)
        .map_err(|code| ResourceAccessError::new(LockFailed, id, code))?;
    trace!(resource = %id, "lock ok");

    // A zero size is how the platform reports a failed size query, so an
    // empty resource cannot be told apart from an error and is rejected.
    let size = match image.size_of(info) {
        Ok(0) => return Err(ResourceAccessError::new(SizeZero, id, 0)),
        Ok(size) => size as usize,
        Err(code) => return Err(ResourceAccessError::new(SizeZero, id, code)),
    };

    // SAFETY: `ResourceSource` implementors guarantee that a pointer returned
    // by `lock` is valid for reads of `size_of` bytes for as long as the
    // source is borrowed, and the bytes are never written through it.
    Ok(unsafe { std::slice::from_raw_parts(ptr.as_ptr().cast_const(), size) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pe::builder::ImageBuilder;
    use crate::formats::pe::PeImage;

    const PAYLOAD: &[u8] = b"MZ\x90\x00embedded payload bytes";

    fn image() -> PeImage<Vec<u8>> {
        let data = ImageBuilder::new()
            .rcdata_id(101, PAYLOAD)
            .rcdata_named("Settings", b"k=v".to_vec())
            .rcdata_id(7, Vec::new())
            .build();
        PeImage::parse(data).unwrap()
    }

    #[test]
    fn default_view_is_empty() {
        let view = ResourceView::default();
        assert!(view.as_ptr().is_null());
        assert_eq!(view.size(), 0);
        assert!(view.is_empty());
        assert_eq!(view.iter().count(), 0);
        assert_eq!(view.as_bytes(), b"");
        assert_eq!(view, ResourceView::empty());
    }

    #[test]
    fn open_by_id() {
        let image = image();
        let view = ResourceView::open(&ResourceId::Id(101), &image).unwrap();
        assert!(!view.as_ptr().is_null());
        assert_eq!(view.size(), PAYLOAD.len());
        assert_eq!(view.as_bytes(), PAYLOAD);
    }

    #[test]
    fn view_borrows_image_bytes() {
        let image = image();
        let view = ResourceView::open(&ResourceId::Id(101), &image).unwrap();
        let range = image.bytes().as_ptr_range();
        assert!(range.contains(&view.as_ptr()));
    }

    #[test]
    fn open_by_name_and_numeric_string() {
        let image = image();
        let view = ResourceView::open(&"settings".into(), &image).unwrap();
        assert_eq!(view.as_bytes(), b"k=v");

        let view = ResourceView::open(&"#101".parse().unwrap(), &image).unwrap();
        assert_eq!(view.size(), PAYLOAD.len());

        // Constructed directly as a name, "#101" still means ID 101
        let view = ResourceView::open(&ResourceId::Name("#101".into()), &image).unwrap();
        assert_eq!(view.size(), PAYLOAD.len());
    }

    #[test]
    fn missing_resource_is_not_found_and_clears() {
        let image = image();
        let mut view = ResourceView::open(&ResourceId::Id(101), &image).unwrap();

        let err = view.reset(&ResourceId::Id(999), &image).unwrap_err();
        assert_eq!(err.kind, ResourceErrorKind::NotFound);
        assert_eq!(err.code, source::ERROR_RESOURCE_NAME_NOT_FOUND);
        assert!(view.as_ptr().is_null());
        assert_eq!(view.size(), 0);
    }

    #[test]
    fn zero_length_resource_is_rejected() {
        let image = image();
        let err = ResourceView::open(&ResourceId::Id(7), &image).unwrap_err();
        assert_eq!(err.kind, ResourceErrorKind::SizeZero);
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Step {
        Load,
        Lock,
        Size,
    }

    /// Finds every resource, then fails at one later step with `code`.
    struct FailingSource {
        fail_at: Option<Step>,
        code: u32,
    }

    static SOURCE_BYTES: [u8; 6] = *b"stored";

    impl FailingSource {
        fn step(&self, step: Step) -> Result<(), u32> {
            if self.fail_at == Some(step) {
                Err(self.code)
            } else {
                Ok(())
            }
        }
    }

    // SAFETY: `lock` points into an immutable static of `size_of` bytes.
    unsafe impl ResourceSource for FailingSource {
        type Info = ();
        type Data = ();

        fn find(&self, _name: ResourceKey<'_>) -> Result<(), u32> {
            Ok(())
        }

        fn load(&self, _info: ()) -> Result<(), u32> {
            self.step(Step::Load)
        }

        fn lock(&self, _data: ()) -> Result<std::ptr::NonNull<u8>, u32> {
            self.step(Step::Lock)?;
            Ok(std::ptr::NonNull::from(&SOURCE_BYTES).cast())
        }

        fn size_of(&self, _info: ()) -> Result<u32, u32> {
            self.step(Step::Size)?;
            Ok(SOURCE_BYTES.len() as u32)
        }
    }

    #[test]
    fn each_step_reports_its_kind_and_code() {
        let image = image();
        let id = ResourceId::Id(101);

        for (step, code, kind) in [
            (Step::Load, 0x715, ResourceErrorKind::LoadFailed),
            (Step::Lock, 0x1f, ResourceErrorKind::LockFailed),
            (Step::Size, 0x57, ResourceErrorKind::SizeZero),
        ] {
            let source = FailingSource {
                fail_at: Some(step),
                code,
            };
            let mut view = ResourceView::open(&id, &image).unwrap();
            assert!(!view.is_empty());

            let err = view.reset(&id, &source).unwrap_err();
            assert_eq!(err.kind, kind);
            assert_eq!(err.code, code);
            assert_eq!(err.id, id);
            assert!(view.is_empty());
            assert!(view.as_ptr().is_null());
            assert_eq!(view.size(), 0);
        }
    }

    #[test]
    fn source_without_failures_yields_its_bytes() {
        let source = FailingSource {
            fail_at: None,
            code: 0,
        };
        let view = ResourceView::open(&ResourceId::Id(1), &source).unwrap();
        assert_eq!(view.as_bytes(), b"stored");
        assert_eq!(view.as_ptr(), SOURCE_BYTES.as_ptr());
    }

    #[test]
    fn clear_is_idempotent() {
        let image = image();
        let mut view = ResourceView::open(&ResourceId::Id(101), &image).unwrap();
        view.clear();
        assert!(view.is_empty());
        let once = view;
        view.clear();
        assert_eq!(view, once);
        assert!(view.as_ptr().is_null());
        assert_eq!(view.size(), 0);
    }

    #[test]
    fn iteration_matches_pointer_read() {
        let image = image();
        let view = ResourceView::open(&ResourceId::Id(101), &image).unwrap();

        let iterated: Vec<u8> = view.into_iter().collect();
        let direct = unsafe { std::slice::from_raw_parts(view.as_ptr(), view.size()) };
        assert_eq!(iterated.len(), view.size());
        assert_eq!(iterated, direct);

        // Restartable
        assert_eq!((&view).into_iter().count(), view.size());
        assert_eq!(view.iter().count(), view.size());
    }

    #[test]
    fn open_current_without_such_resource() {
        // The test harness embeds no RCDATA; off Windows it is not even PE.
        let err = ResourceView::open_current(&ResourceId::Id(0x7ff3)).unwrap_err();
        let expected = if cfg!(windows) {
            crate::ErrorKind::NotFound
        } else {
            crate::ErrorKind::Image
        };
        assert_eq!(err.kind(), expected);
    }

    #[test]
    fn resource_id_parsing_and_display() {
        assert_eq!(ResourceId::from("#42"), ResourceId::Id(42));
        assert_eq!(ResourceId::from("#"), ResourceId::Name("#".into()));
        assert_eq!(ResourceId::from("#4x"), ResourceId::Name("#4x".into()));
        assert_eq!(ResourceId::from("#70000"), ResourceId::Name("#70000".into()));
        assert_eq!(ResourceId::Id(42).to_string(), "#42");
        assert_eq!(ResourceId::Name("DLL".into()).to_string(), "DLL");
    }

    #[test]
    fn error_message_names_step_and_code() {
        let err = ResourceAccessError::new(ResourceErrorKind::NotFound, &ResourceId::Id(5), 1814);
        assert_eq!(err.to_string(), "Cannot find the resource #5 (error code 1814)");
    }
}
