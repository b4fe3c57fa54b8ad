//! Image tagging overlay.
//!
//! While composing a post, the author clicks a point on the staged image,
//! picks a user and confirms, which places a name label at that point. The
//! labelled names travel with the post as its tags.

use socialsync_common::TaggingConfig;

/// A point relative to the image's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// A user that can be tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub uid: String,
    pub name: String,
}

/// A placed label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedUser {
    pub name: String,
    pub position: Position,
}

/// The image being tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub url: String,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone)]
struct PendingTag {
    position: Position,
    selected: Option<UserRef>,
}

type TagsChanged = Box<dyn FnMut(&[TaggedUser]) + Send>;

/// Click-to-tag state for one composer.
pub struct TaggingOverlay {
    config: TaggingConfig,
    image: Option<StagedImage>,
    pending: Option<PendingTag>,
    tagged: Vec<TaggedUser>,
    on_change: Option<TagsChanged>,
}

impl TaggingOverlay {
    /// Create an overlay with no image staged.
    #[must_use]
    pub fn new(config: TaggingConfig) -> Self {
        Self {
            config,
            image: None,
            pending: None,
            tagged: Vec::new(),
            on_change: None,
        }
    }

    /// Call `callback` with the full tag list whenever a tag is confirmed.
    pub fn on_change(&mut self, callback: impl FnMut(&[TaggedUser]) + Send + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    /// Show `image` for tagging. Already placed tags are kept.
    pub fn stage_image(&mut self, image: StagedImage) {
        tracing::debug!(url = %image.url, "Staged image for tagging");
        self.image = Some(image);
        self.pending = None;
    }

    /// The staged image, if any.
    #[must_use]
    pub const fn image(&self) -> Option<&StagedImage> {
        self.image.as_ref()
    }

    /// Start a tag at an image-relative point.
    ///
    /// The point is clamped onto the staged image. Clicks with no image
    /// staged are ignored. A new click replaces an unconfirmed one.
    pub fn click(&mut self, x: i32, y: i32) -> bool {
        let Some(image) = &self.image else {
            return false;
        };
        let position = Position {
            x: x.clamp(0, image.width.max(0)),
            y: y.clamp(0, image.height.max(0)),
        };
        self.pending = Some(PendingTag {
            position,
            selected: None,
        });
        true
    }

    /// Choose who the pending tag is for.
    pub fn select(&mut self, user: UserRef) -> bool {
        match &mut self.pending {
            Some(pending) => {
                pending.selected = Some(user);
                true
            }
            None => false,
        }
    }

    /// Where the pending tag sits and who is selected for it.
    #[must_use]
    pub fn pending(&self) -> Option<(Position, Option<&UserRef>)> {
        self.pending
            .as_ref()
            .map(|p| (p.position, p.selected.as_ref()))
    }

    /// Place the pending tag.
    ///
    /// Does nothing unless a point was clicked and a user selected.
    pub fn confirm(&mut self) -> bool {
        let Some(PendingTag {
            position,
            selected: Some(user),
        }) = self.pending.take()
        else {
            return false;
        };

        tracing::debug!(user = %user.uid, x = position.x, y = position.y, "Tagged user");
        self.tagged.push(TaggedUser {
            name: user.name,
            position,
        });
        if let Some(callback) = &mut self.on_change {
            callback(&self.tagged);
        }
        true
    }

    /// Drop the pending tag.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Placed tags, in placement order.
    #[must_use]
    pub fn tagged(&self) -> &[TaggedUser] {
        &self.tagged
    }

    /// Names of placed tags, for storing on the post.
    #[must_use]
    pub fn tag_names(&self) -> Vec<String> {
        self.tagged.iter().map(|t| t.name.clone()).collect()
    }

    /// Where each label is drawn.
    ///
    /// Labels are clamped into the configured render area, which can be
    /// smaller than the image; stored positions are left untouched.
    #[must_use]
    pub fn render_positions(&self) -> Vec<(String, Position)> {
        let max_x = self.config.render_width.max(0);
        let max_y = self.config.render_height.max(0);
        self.tagged
            .iter()
            .map(|t| {
                let position = Position {
                    x: t.position.x.clamp(0, max_x),
                    y: t.position.y.clamp(0, max_y),
                };
                (t.name.clone(), position)
            })
            .collect()
    }

    /// Forget the image and every tag.
    pub fn clear(&mut self) {
        self.image = None;
        self.pending = None;
        self.tagged.clear();
    }
}
