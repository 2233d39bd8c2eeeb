use ocrtex::document::{DocState, Document, Stage};

#[test]
fn base_name_is_the_file_stem() {
    let doc = Document::new("pdfs_to_process/my.paper.pdf");
    assert_eq!(doc.base_name(), "my.paper");
    assert_eq!(doc.file_name(), "my.paper.pdf");
    assert_eq!(doc.state(), DocState::Pending);
}

#[test]
fn happy_path_walks_every_state() {
    let mut doc = Document::new("a.pdf");
    let seen: Vec<DocState> = (0..8).map(|_| doc.advance()).collect();
    assert_eq!(
        seen,
        vec![
            DocState::OcrRunning,
            DocState::OcrDone,
            DocState::Materializing,
            DocState::MaterializeDone,
            DocState::LatexRunning,
            DocState::LatexDone,
            DocState::Archived,
            DocState::Archived,
        ]
    );
    assert!(doc.state().is_terminal());
}

#[test]
fn failure_records_running_stage() {
    let mut doc = Document::new("a.pdf");
    doc.advance();
    assert_eq!(doc.fail(), Stage::Ocr);
    assert_eq!(doc.state(), DocState::Failed);

    let mut doc = Document::new("b.pdf");
    for _ in 0..5 {
        doc.advance();
    }
    assert_eq!(doc.state(), DocState::LatexRunning);
    assert_eq!(doc.fail(), Stage::Latex);
}
