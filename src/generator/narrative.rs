//! Deterministic narrative assembly for offline biography generation.
//!
//! Each image contributes one life segment built from three parts: a time
//! phrase keyed by the image's position, a story derived from an orientation
//! heuristic plus any completed annotation, and a connector leading into the
//! next segment. A conclusion and a generation footer close the text. There
//! is no randomness anywhere, so identical inputs always yield identical
//! output.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::images::ImagePayload;
use crate::models::Annotation;

/// Opening phrases, one per image in order. Positions past the end of the
/// table fall back to [`GENERIC_TIME_PHRASE`].
const TIME_PHRASES: &[&str] = &[
    "In the early stages of life",
    "As time progressed",
    "During the growth process",
    "In the middle period of life",
    "During this important time",
    "With enriched experiences",
    "At this stage of life",
    "As time flowed to this period",
];

const GENERIC_TIME_PHRASE: &str = "At this precious moment in life";

/// Transitions between consecutive segments. The final segment gets none.
const CONNECTORS: &[&str] = &[
    "This experience laid the foundation for the subsequent life path.",
    "As time progressed, life welcomed a new chapter.",
    "These precious memories became the motivation to continue forward.",
    "Life's journey continued ahead, bringing new opportunities and challenges.",
    "On this foundation, life welcomed an even more exciting stage.",
    "These experiences became the source of life's wisdom.",
    "Carrying these beautiful memories, life's story continued to unfold.",
];

const GENERIC_CONNECTOR: &str = "This experience became an indispensable part of life.";

/// Keyword groups matched against the lowercased story text, each with the
/// elaboration appended when any keyword hits. First match wins.
const ELABORATIONS: &[(&[&str], &str)] = &[
    (
        &["study", "book", "learning"],
        "This period of learning experience was not just about accumulating knowledge, but also an important cornerstone of personal growth. Each learning experience was shaping the future self, preparing for the next stage of life.",
    ),
    (
        &["work", "career", "job"],
        "In the professional career, this stage demonstrated professional growth and personal persistence. Every challenge was an opportunity for growth, and every achievement was a reward for hard work.",
    ),
    (
        &["family", "home", "relatives"],
        "Family is the warmest harbor in life, and these precious moments recorded the warmth of kinship and the meaning of home. Here, inner peace and the true meaning of life were found.",
    ),
    (
        &["travel", "scenery", "journey"],
        "Travel is not just exploration of the outside world, but also discovery of the inner self. Each journey brought new perspectives and experiences, enriching life's experiences and depth.",
    ),
    (
        &["friend", "gathering", "social"],
        "Friendship is precious wealth on life's journey, and these shared memories witnessed the footprints of growth and the depth of friendship. With friends' companionship, life became more colorful and rich.",
    ),
];

const GENERIC_ELABORATION: &str = "This moment carried special meaning, recording an important segment of life. Every detail was worth treasuring, and every instant was telling a unique story.";

/// Builds the full narrative text for an ordered set of images.
///
/// Annotations are matched to images by `image_id`; only completed ones
/// contribute. `generated_at` is stamped into the footer, so callers that
/// need reproducible output pass a fixed instant.
pub fn compose_narrative(
    requirements: &str,
    images: &[ImagePayload],
    annotations: &[Annotation],
    generated_at: DateTime<Utc>,
) -> String {
    let notes: HashMap<&str, &Annotation> = annotations
        .iter()
        .filter(|a| a.is_completed)
        .map(|a| (a.image_id.as_str(), a))
        .collect();

    let mut narrative = format!(
        "Personal Biography\n\nThis biography has been created based on your requirements: \"{}\"\n\n",
        requirements.trim()
    );

    let total = images.len();
    for (index, image) in images.iter().enumerate() {
        let segment = life_segment(image, notes.get(image.id.as_str()).copied(), index, total);
        narrative.push_str(&segment);
        if index + 1 < total {
            narrative.push_str("\n\n");
        }
    }

    narrative.push_str("\n\n");
    narrative.push_str(&conclusion(total));
    narrative.push_str("\n\n---\n");
    narrative.push_str(&format!(
        "Generated on: {}\n",
        generated_at.format("%A, %B %-d, %Y at %H:%M")
    ));
    narrative
}

fn life_segment(
    image: &ImagePayload,
    annotation: Option<&Annotation>,
    index: usize,
    total: usize,
) -> String {
    let phrase = time_phrase(index);
    let story = story_for(image, annotation, index);
    match connector(index, total) {
        Some(link) => format!("{}\n\n{}\n\n{}", phrase, story, link),
        None => format!("{}\n\n{}", phrase, story),
    }
}

fn time_phrase(index: usize) -> &'static str {
    TIME_PHRASES.get(index).copied().unwrap_or(GENERIC_TIME_PHRASE)
}

fn connector(index: usize, total: usize) -> Option<&'static str> {
    if index + 1 == total {
        return None;
    }
    Some(CONNECTORS.get(index).copied().unwrap_or(GENERIC_CONNECTOR))
}

fn story_for(image: &ImagePayload, annotation: Option<&Annotation>, index: usize) -> String {
    let mut story = describe_image(image, index);
    if let Some(note) = annotation {
        story.push_str(&format!(
            " The photo dates to {}: {}.",
            note.time_period.trim(),
            note.activity.trim()
        ));
    }

    let lowered = story.to_lowercase();
    let elaboration = ELABORATIONS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, text)| *text)
        .unwrap_or(GENERIC_ELABORATION);
    story.push(' ');
    story.push_str(elaboration);
    story
}

fn describe_image(image: &ImagePayload, index: usize) -> String {
    let orientation = if image.is_portrait() {
        "portrait"
    } else {
        "landscape"
    };
    let mut text = format!("Photo {}: this is a {} photograph.", index + 1, orientation);
    text.push_str(match index {
        0 => " It appears to be an important commemorative photo, recording a special moment in life.",
        1 => " This photo shows a slice of daily life, reflecting a personal way of living.",
        _ => " This photo adds rich visual elements to the personal biography.",
    });
    text
}

fn conclusion(image_count: usize) -> String {
    format!(
        "Conclusion\n\n\
         These {} precious life segments, like exquisite paintings, together weave a complete and unique life story. \
         Each stage has its unique value and meaning, and every moment deserves to be treasured forever.\n\n\
         From these images, we see a person's growth trajectory and feel the richness and diversity of life. \
         These real experiences and sincere emotions constitute a life story full of flesh and blood, laughter and tears.\n\n\
         May this biography serve as a precious memorial, recording these beautiful times, and also providing warm memories and motivation for future days.",
        image_count
    )
}
