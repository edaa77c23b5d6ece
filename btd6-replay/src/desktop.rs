//! Desktop backend seam.
//!
//! Reference images are discovered on disk so the CLI can tell which modes are
//! usable. Screen capture, recognition and input need a platform backend that
//! this build does not ship; those calls fail with [`DeviceError::Unsupported`].

use btd6_core::{Clock, DeviceError, Input, KeyCode, Point, Rect, Resolution, Template, Vision};
use log::debug;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const UNSUPPORTED: &str = "this build has no screen capture or input backend";
const COLLECTION_PREFIX: &str = "collection_events/";

/// Primary screen size, when a platform backend can report it.
pub const fn screen_resolution() -> Option<Resolution> {
    None
}

pub struct DesktopHost {
    resolution: Resolution,
    templates: BTreeSet<String>,
    started: Instant,
    interrupted: Arc<AtomicBool>,
}

impl DesktopHost {
    /// Indexes the reference images under `<images_dir>/<WxH>/`.
    pub fn new(images_dir: &Path, resolution: Resolution) -> Self {
        let root = images_dir.join(resolution.to_string());
        let mut templates = BTreeSet::new();
        collect_stems(&root, "", &mut templates);
        debug!("{} reference images under {}", templates.len(), root.display());
        Self {
            resolution,
            templates,
            started: Instant::now(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that, once set, makes the driver save and stop on its next tick.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    fn unsupported() -> DeviceError {
        DeviceError::Unsupported(UNSUPPORTED.to_string())
    }
}

/// Adds the stem of every `.png` below `dir`, nested stems joined with `/`.
fn collect_stems(dir: &Path, prefix: &str, out: &mut BTreeSet<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_stem().and_then(|name| name.to_str()) else {
            continue;
        };
        if path.is_dir() {
            collect_stems(&path, &format!("{prefix}{name}/"), out);
        } else if path.extension().is_some_and(|ext| ext == "png") {
            out.insert(format!("{prefix}{name}"));
        }
    }
}

impl Vision for DesktopHost {
    type Frame = ();

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn capture_screen(&mut self) -> Result<(), DeviceError> {
        Err(Self::unsupported())
    }

    fn is_target_application_focused(&mut self) -> bool {
        true
    }

    fn has_template(&self, template: &Template) -> bool {
        self.templates.contains(&template.stem())
    }

    fn collection_events(&self) -> Vec<String> {
        self.templates
            .iter()
            .filter_map(|stem| stem.strip_prefix(COLLECTION_PREFIX))
            .map(str::to_string)
            .collect()
    }

    fn match_template(&mut self, _: &(), _: Rect, _: &Template) -> Result<f64, DeviceError> {
        Err(Self::unsupported())
    }

    fn locate_template(&mut self, _: &(), _: &Template) -> Result<(f64, Point), DeviceError> {
        Err(Self::unsupported())
    }

    fn recognize_digits(&mut self, _: &(), _: Rect) -> Result<String, DeviceError> {
        Err(Self::unsupported())
    }
}

impl Input for DesktopHost {
    fn send_key(&mut self, _: &KeyCode) -> Result<(), DeviceError> {
        Err(Self::unsupported())
    }

    fn click(&mut self, _: Point) -> Result<(), DeviceError> {
        Err(Self::unsupported())
    }

    fn click_here(&mut self) -> Result<(), DeviceError> {
        Err(Self::unsupported())
    }

    fn move_cursor(&mut self, _: Point) -> Result<(), DeviceError> {
        Err(Self::unsupported())
    }

    fn interrupt_requested(&mut self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl Clock for DesktopHost {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btd6_core::capabilities::ReferenceInventory;
    use btd6_core::{ModeKind, Screen};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    const QHD: Resolution = Resolution::new(2560, 1440);

    fn images_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("btd6-images-{label}-{nanos}"))
    }

    fn touch(root: &Path, stem: &str) {
        let path = root.join(format!("{stem}.png"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn indexes_nested_reference_images() {
        let dir = images_dir("index");
        let root = dir.join("2560x1440");
        for template in Template::required() {
            touch(&root, &template.stem());
        }
        touch(&root, "collection_events/totem");
        fs::write(root.join("notes.txt"), b"").unwrap();

        let host = DesktopHost::new(&dir, QHD);
        assert!(host.has_template(&Template::Screen(Screen::Startmenu)));
        assert!(!host.has_template(&Template::UnknownInsta));
        assert_eq!(host.collection_events(), vec!["totem".to_string()]);

        let inventory = ReferenceInventory::check(&host).unwrap();
        assert!(inventory.supports(ModeKind::Single));
        assert!(!inventory.supports(ModeKind::Chase));
    }

    #[test]
    fn missing_images_and_devices_are_reported() {
        let mut host = DesktopHost::new(&images_dir("empty"), QHD);
        assert!(matches!(
            ReferenceInventory::check(&host),
            Err(DeviceError::MissingTemplates(missing)) if !missing.is_empty()
        ));
        assert!(matches!(host.capture_screen(), Err(DeviceError::Unsupported(_))));
        assert!(host.click(Point::new(1, 1)).is_err());
    }

    #[test]
    fn interrupt_flag_reaches_the_input_seam() {
        let mut host = DesktopHost::new(&images_dir("interrupt"), QHD);
        assert!(!host.interrupt_requested());
        host.interrupt_flag().store(true, Ordering::SeqCst);
        assert!(host.interrupt_requested());
    }
}
