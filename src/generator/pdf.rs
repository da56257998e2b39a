//! PDF rendering for offline-generated biographies.
//!
//! Produces an A4 document with a cover page (title, optional cover image,
//! subtitle, date) followed by one page per paginated chunk of the
//! narrative. Text is set in the built-in Helvetica faces so the document
//! needs no embedded fonts.

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::layout::{
    self, AVG_ADVANCE_EM, BODY_FONT_SIZE, LINE_HEIGHT, MARGIN_X, MARGIN_Y, PAGE_HEIGHT, PAGE_WIDTH,
};
use super::GeneratorError;
use crate::images::ImagePayload;

const COVER_TITLE: &str = "Personal Biography";
const COVER_SUBTITLE: &str = "A Journey Through Life";

const TITLE_SIZE: f64 = 28.0;
const SUBTITLE_SIZE: f64 = 16.0;
const DATE_SIZE: f64 = 14.0;
const FOOTER_SIZE: f64 = 9.0;

const COVER_IMAGE_SIZE: f64 = 200.0;

/// Renders the narrative into a complete PDF document.
pub fn render_document(
    narrative: &str,
    cover_image: Option<&ImagePayload>,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, GeneratorError> {
    let body_pages = layout::paginate(narrative);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });

    let mut resources = dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    };
    let has_cover_image = cover_image.is_some();
    if let Some(payload) = cover_image {
        let image_id = image_xobject(&mut doc, payload)?;
        resources.set("XObject", dictionary! { "Im0" => image_id });
    }
    let resources_id = doc.add_object(resources);

    let mut page_ids: Vec<ObjectId> = Vec::new();
    page_ids.push(add_page(
        &mut doc,
        pages_id,
        cover_page_ops(has_cover_image, generated_at),
    )?);
    let total = body_pages.len();
    for (index, body) in body_pages.iter().enumerate() {
        page_ids.push(add_page(
            &mut doc,
            pages_id,
            content_page_ops(body, index + 1, total),
        )?);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_ids.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![int(0), int(0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    ops: Vec<Operation>,
) -> Result<ObjectId, GeneratorError> {
    let content = Content { operations: ops };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    }))
}

fn cover_page_ops(has_image: bool, generated_at: DateTime<Utc>) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![real(0.7), real(0.85), real(1.0)]),
        Operation::new("re", vec![real(0.0), real(0.0), real(PAGE_WIDTH), real(PAGE_HEIGHT)]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ];

    let title_y = PAGE_HEIGHT - 150.0 - TITLE_SIZE;
    text_run(&mut ops, "F2", TITLE_SIZE, centered_x(COVER_TITLE, TITLE_SIZE), title_y, (1.0, 1.0, 1.0), COVER_TITLE);

    if has_image {
        let image_x = (PAGE_WIDTH - COVER_IMAGE_SIZE) / 2.0;
        let image_y = PAGE_HEIGHT - 250.0 - COVER_IMAGE_SIZE;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                real(COVER_IMAGE_SIZE),
                real(0.0),
                real(0.0),
                real(COVER_IMAGE_SIZE),
                real(image_x),
                real(image_y),
            ],
        ));
        ops.push(Operation::new("Do", vec![name("Im0")]));
        ops.push(Operation::new("Q", vec![]));
    }

    let subtitle_y = PAGE_HEIGHT - 500.0 - SUBTITLE_SIZE;
    text_run(
        &mut ops,
        "F1",
        SUBTITLE_SIZE,
        centered_x(COVER_SUBTITLE, SUBTITLE_SIZE),
        subtitle_y,
        (1.0, 1.0, 1.0),
        COVER_SUBTITLE,
    );

    let date_text = generated_at.format("%B %-d, %Y").to_string();
    let date_y = PAGE_HEIGHT - 600.0 - DATE_SIZE;
    text_run(
        &mut ops,
        "F1",
        DATE_SIZE,
        centered_x(&date_text, DATE_SIZE),
        date_y,
        (1.0, 1.0, 1.0),
        &date_text,
    );

    ops
}

fn content_page_ops(body: &str, page_number: usize, total_pages: usize) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![name("F1"), real(BODY_FONT_SIZE)]),
        Operation::new("TL", vec![real(LINE_HEIGHT)]),
        Operation::new(
            "Td",
            vec![real(MARGIN_X), real(PAGE_HEIGHT - MARGIN_Y - BODY_FONT_SIZE)],
        ),
    ];
    for (index, line) in layout::wrap_lines(body).iter().enumerate() {
        if index > 0 {
            ops.push(Operation::new("T*", vec![]));
        }
        ops.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
    }
    ops.push(Operation::new("ET", vec![]));

    let footer = format!("Page {} of {}", page_number, total_pages);
    text_run(
        &mut ops,
        "F1",
        FOOTER_SIZE,
        centered_x(&footer, FOOTER_SIZE),
        40.0,
        (0.4, 0.4, 0.4),
        &footer,
    );
    ops
}

fn text_run(
    ops: &mut Vec<Operation>,
    font: &str,
    size: f64,
    x: f64,
    y: f64,
    color: (f64, f64, f64),
    text: &str,
) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "rg",
        vec![real(color.0), real(color.1), real(color.2)],
    ));
    ops.push(Operation::new("Tf", vec![name(font), real(size)]));
    ops.push(Operation::new("Td", vec![real(x), real(y)]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
    ops.push(Operation::new("ET", vec![]));
}

/// Centers text horizontally using the same average-advance approximation
/// the pagination layer measures with.
fn centered_x(text: &str, size: f64) -> f64 {
    let width = text.chars().count() as f64 * size * AVG_ADVANCE_EM;
    ((PAGE_WIDTH - width) / 2.0).max(MARGIN_X)
}

/// Re-encodes the payload as baseline JPEG and registers it as an image
/// XObject.
fn image_xobject(doc: &mut Document, payload: &ImagePayload) -> Result<ObjectId, GeneratorError> {
    let decoded = image::load_from_memory(&payload.bytes)?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, 80))?;

    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    );
    Ok(doc.add_object(stream))
}

fn int(v: i64) -> Object {
    Object::Integer(v)
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn name(v: &str) -> Object {
    Object::Name(v.as_bytes().to_vec())
}
