//! Collaborators the replay driver needs from the host machine.
//!
//! Screen capture, template matching, digit recognition and synthetic input
//! are provided by a platform backend; the driver only sees these traits.

use crate::data::KeyCode;
use crate::geometry::{Point, Rect, Resolution};
use crate::replay::ModeKind;
use crate::replay::screens::{GameStateKind, Screen};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A reference image known to the vision backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Template {
    Screen(Screen),
    GameState(GameStateKind),
    RemoveObstacleConfirm,
    HomeButton,
    /// Matched with a mask so the insta's own artwork is ignored.
    UnknownInsta,
    /// Icon of a collection event, by event name.
    Collection(String),
}

impl Template {
    /// File stem of the reference image.
    #[must_use]
    pub fn stem(&self) -> String {
        match self {
            Self::Screen(screen) => screen.template_name().to_string(),
            Self::GameState(kind) => kind.template_name().to_string(),
            Self::RemoveObstacleConfirm => "remove_obstacle_confirm_button".to_string(),
            Self::HomeButton => "button_home".to_string(),
            Self::UnknownInsta => "unknown_insta".to_string(),
            Self::Collection(event) => format!("collection_events/{event}"),
        }
    }

    /// Templates every mode needs.
    #[must_use]
    pub fn required() -> Vec<Self> {
        Screen::CLASSIFIED
            .into_iter()
            .filter(|screen| screen.is_required())
            .map(Self::Screen)
            .chain(GameStateKind::ALL.into_iter().map(Self::GameState))
            .chain([Self::RemoveObstacleConfirm, Self::HomeButton])
            .collect()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("screen capture failed: {0}")]
    Capture(String),
    #[error("input injection failed: {0}")]
    Input(String),
    #[error("no reference image loaded for {0}")]
    MissingTemplate(Template),
    #[error("missing reference images: {}", .0.join(", "))]
    MissingTemplates(Vec<String>),
    #[error("{0}")]
    Unsupported(String),
}

/// Screen capture and recognition.
pub trait Vision {
    type Frame;

    /// Size of the captured screen.
    fn resolution(&self) -> Resolution;

    /// # Errors
    ///
    /// Returns an error if the screen cannot be captured.
    fn capture_screen(&mut self) -> Result<Self::Frame, DeviceError>;

    fn is_target_application_focused(&mut self) -> bool;

    fn has_template(&self, template: &Template) -> bool;

    /// Names of the collection events with a loaded icon.
    fn collection_events(&self) -> Vec<String>;

    /// Normalized squared difference of `area` against `template`; 0 is identical.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not loaded or matching fails.
    fn match_template(
        &mut self,
        frame: &Self::Frame,
        area: Rect,
        template: &Template,
    ) -> Result<f64, DeviceError>;

    /// Best match of `template` anywhere on the frame, with the center of the match.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not loaded or matching fails.
    fn locate_template(
        &mut self,
        frame: &Self::Frame,
        template: &Template,
    ) -> Result<(f64, Point), DeviceError>;

    /// Raw text read from `area`; the caller parses it.
    ///
    /// # Errors
    ///
    /// Returns an error if recognition fails outright.
    fn recognize_digits(&mut self, frame: &Self::Frame, area: Rect) -> Result<String, DeviceError>;
}

/// Synthetic keyboard and mouse input.
pub trait Input {
    /// # Errors
    ///
    /// Returns an error if the key cannot be sent.
    fn send_key(&mut self, key: &KeyCode) -> Result<(), DeviceError>;

    /// Moves to `position` and clicks.
    ///
    /// # Errors
    ///
    /// Returns an error if the click cannot be sent.
    fn click(&mut self, position: Point) -> Result<(), DeviceError>;

    /// Clicks wherever the cursor is.
    ///
    /// # Errors
    ///
    /// Returns an error if the click cannot be sent.
    fn click_here(&mut self) -> Result<(), DeviceError>;

    /// # Errors
    ///
    /// Returns an error if the cursor cannot be moved.
    fn move_cursor(&mut self, position: Point) -> Result<(), DeviceError>;

    /// Operator asked to stop once the current game is over.
    fn exit_hotkey_pressed(&mut self) -> bool {
        false
    }

    /// Operator is holding ctrl; the driver pauses while it is held.
    fn control_held(&mut self) -> bool {
        false
    }

    /// Operator interrupted the process; the driver saves and stops at once.
    fn interrupt_requested(&mut self) -> bool {
        false
    }
}

/// Monotonic time source.
pub trait Clock {
    fn elapsed(&self) -> Duration;

    fn sleep(&mut self, duration: Duration);
}

/// Everything the replay driver talks to.
pub trait Host: Vision + Input + Clock {}

impl<T: Vision + Input + Clock> Host for T {}

/// Which run modes the loaded reference images allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceInventory {
    pub supported: Vec<ModeKind>,
    pub collection_events: Vec<String>,
}

impl ReferenceInventory {
    /// Checks the backend's loaded templates.
    ///
    /// Chasing rewards additionally needs the claim-chest screen, the unknown
    /// insta icon and at least one collection event icon.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::MissingTemplates`] when a template every mode needs is absent.
    pub fn check<V: Vision + ?Sized>(vision: &V) -> Result<Self, DeviceError> {
        let missing: Vec<String> = Template::required()
            .iter()
            .filter(|template| !vision.has_template(template))
            .map(Template::stem)
            .collect();
        if !missing.is_empty() {
            return Err(DeviceError::MissingTemplates(missing));
        }

        let collection_events = vision.collection_events();
        let chase_ready = vision.has_template(&Template::Screen(Screen::CollectionClaimChest))
            && vision.has_template(&Template::UnknownInsta)
            && !collection_events.is_empty();
        let supported = ModeKind::ALL
            .into_iter()
            .filter(|mode| *mode != ModeKind::Chase || chase_ready)
            .collect();
        Ok(Self {
            supported,
            collection_events,
        })
    }

    #[must_use]
    pub fn supports(&self, mode: ModeKind) -> bool {
        self.supported.contains(&mode)
    }
}
