//! Resolves the media-item classes used by the gallery import path.

use crate::mapper::{ClassIndex, ClassMapper, MapperRule, SlotTable};

/// Slot: dotted name of the camera-roll media id class
pub const CAMERA_ROLL_MEDIA_ID_CLASS: &str = "cameraRollMediaIdClass";
/// Slot: name of its duration field (milliseconds, long)
pub const DURATION_MS_FIELD: &str = "durationMsField";
/// Slot: dotted name of the default media item class
pub const DEFAULT_MEDIA_ITEM_CLASS: &str = "defaultMediaItemClass";
/// Slot: name of the default media item's duration field
pub const DEFAULT_MEDIA_ITEM_DURATION_MS_FIELD: &str = "defaultMediaItemDurationMsField";

/// Maps the two media-item representations and their duration fields.
///
/// Both targets are data classes whose generated `toString` bodies embed
/// stable label constants, which is what the rules anchor on.
pub struct MediaItemMapper;

impl ClassMapper for MediaItemMapper {
    fn name(&self) -> &'static str {
        "media_item"
    }

    fn slots(&self) -> &'static [&'static str] {
        &[
            CAMERA_ROLL_MEDIA_ID_CLASS,
            DURATION_MS_FIELD,
            DEFAULT_MEDIA_ITEM_CLASS,
            DEFAULT_MEDIA_ITEM_DURATION_MS_FIELD,
        ]
    }

    fn rules(&self) -> &'static [MapperRule] {
        &[camera_roll_media_id_rule, default_media_item_rule]
    }
}

/// The camera-roll id class prints `CameraRollMediaId` in its `toString`
/// and carries exactly one long field, the duration in milliseconds.
fn camera_roll_media_id_rule(index: &ClassIndex, slots: &mut SlotTable) {
    for class in index.classes() {
        let has_marker = class
            .method("toString")
            .and_then(|m| m.body.as_ref())
            .is_some_and(|body| body.find_const_string("CameraRollMediaId", true));
        if !has_marker {
            continue;
        }
        let Some(duration_field) = class.field_of_type("J") else {
            continue;
        };

        slots.set(CAMERA_ROLL_MEDIA_ID_CLASS, class.java_name());
        slots.set(DURATION_MS_FIELD, &duration_field.name);
        return;
    }
}

/// The default media item extends an abstract `Comparable` base, exposes a
/// `Uri` accessor, and its `toString` prints a `durationInMillis` label
/// right before loading the duration field.
fn default_media_item_rule(index: &ClassIndex, slots: &mut SlotTable) {
    for class in index.classes() {
        let Some(superclass) = class
            .superclass
            .as_deref()
            .and_then(|name| index.get_class(name))
        else {
            continue;
        };
        if !superclass.is_abstract()
            || superclass.interfaces.first().map(String::as_str) != Some("Ljava/lang/Comparable;")
        {
            continue;
        }
        if !class
            .methods
            .iter()
            .any(|m| m.return_type == "Landroid/net/Uri;")
        {
            continue;
        }
        let Some(duration_field) = class
            .method("toString")
            .and_then(|m| m.body.as_ref())
            .filter(|body| body.find_const_string("metadata", true))
            .and_then(|body| body.search_next_field_reference("durationInMillis", true))
        else {
            continue;
        };

        slots.set(DEFAULT_MEDIA_ITEM_CLASS, class.java_name());
        slots.set(DEFAULT_MEDIA_ITEM_DURATION_MS_FIELD, &duration_field.name);
        return;
    }
}
