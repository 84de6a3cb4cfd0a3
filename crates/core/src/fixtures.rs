//! PDF builders for tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

pub(crate) fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    build_pdf(pages.iter().map(|text| text_operations(text)).collect())
}

pub(crate) fn image_only_pdf() -> Vec<u8> {
    build_pdf(vec![vec![
        Operation::new("m", vec![10.into(), 10.into()]),
        Operation::new("l", vec![200.into(), 200.into()]),
        Operation::new("S", vec![]),
    ]])
}

fn text_operations(text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

fn build_pdf(page_operations: Vec<Vec<Operation>>) -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id: ObjectId = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for operations in page_operations {
        let content = Content { operations };
        let encoded = content.encode().expect("content stream encodes");
        let content_id = document.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    document.save_to(&mut buffer).expect("pdf serializes");
    buffer
}
