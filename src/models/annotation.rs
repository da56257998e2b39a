//! Per-image annotations collected from the user.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A user-supplied time/activity label attached to one input image.
///
/// Keyed by `image_id`: writing a second annotation for the same image
/// replaces the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Stable id of the annotated image (content hash of the file).
    pub image_id: String,
    /// Where the image lived when it was annotated.
    pub image_path: PathBuf,
    /// Free-text time period ("summer 1998", "college years").
    pub time_period: String,
    /// Free-text description of what was happening.
    pub activity: String,
    /// False for entries the user skipped.
    pub is_completed: bool,
}

impl Annotation {
    /// An empty placeholder for a skipped image.
    pub fn skipped(image_id: String, image_path: PathBuf) -> Self {
        Self {
            image_id,
            image_path,
            time_period: String::new(),
            activity: String::new(),
            is_completed: false,
        }
    }
}

/// Replace-or-append `incoming` into `set`, keyed by `image_id`.
///
/// Replacement happens in place so the set keeps its original order;
/// unseen keys append at the end.
pub fn upsert_annotation(set: &mut Vec<Annotation>, incoming: Annotation) {
    match set.iter().position(|a| a.image_id == incoming.image_id) {
        Some(idx) => set[idx] = incoming,
        None => set.push(incoming),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(id: &str, time: &str, activity: &str) -> Annotation {
        Annotation {
            image_id: id.to_string(),
            image_path: PathBuf::from(format!("/photos/{}.jpg", id)),
            time_period: time.to_string(),
            activity: activity.to_string(),
            is_completed: true,
        }
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let mut set = vec![ann("a", "2020", "school")];
        upsert_annotation(&mut set, ann("a", "2021", "work"));
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].time_period, "2021");
        assert_eq!(set[0].activity, "work");
    }

    #[test]
    fn test_upsert_preserves_order() {
        let mut set = vec![ann("a", "2020", "school"), ann("b", "2021", "travel")];
        upsert_annotation(&mut set, ann("a", "2022", "family"));
        upsert_annotation(&mut set, ann("c", "2023", "career"));
        let ids: Vec<_> = set.iter().map(|a| a.image_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(set[0].time_period, "2022");
    }
}
