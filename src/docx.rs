use std::path::Path;

use docx_rs::{DocumentChild, ParagraphChild, RunChild};

use crate::processor::ExtractError;

/// Body paragraphs in document order, each followed by a newline.
/// Paragraphs nested in tables are not body paragraphs and are skipped.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    let docx = docx_rs::read_docx(&bytes)
        .map_err(|e| ExtractError::WordProcessor(format!("{e:?}")))?;

    let mut text = String::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            push_runs(&mut text, &paragraph.children);
            text.push('\n');
        }
    }
    Ok(text)
}

fn push_runs(text: &mut String, children: &[ParagraphChild]) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => (),
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_runs(text, &link.children),
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{BreakType, Docx, Paragraph, Run, Table, TableCell, TableRow};
    use std::fs::File;

    fn write_docx(path: &Path, docx: Docx) {
        let file = File::create(path).unwrap();
        docx.build().pack(file).unwrap();
    }

    fn paragraph(text: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(text))
    }

    #[test]
    fn test_paragraphs_end_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.docx");
        write_docx(
            &path,
            Docx::new()
                .add_paragraph(paragraph("Hello"))
                .add_paragraph(paragraph("World")),
        );

        assert_eq!(extract_text(&path).unwrap(), "Hello\nWorld\n");
    }

    #[test]
    fn test_runs_tabs_and_breaks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.docx");
        let mixed = Paragraph::new()
            .add_run(Run::new().add_text("Name:"))
            .add_run(Run::new().add_tab().add_text("Ada"))
            .add_run(Run::new().add_break(BreakType::TextWrapping).add_text("Lovelace"));
        write_docx(&path, Docx::new().add_paragraph(mixed).add_paragraph(Paragraph::new()));

        assert_eq!(extract_text(&path).unwrap(), "Name:\tAda\nLovelace\n\n");
    }

    #[test]
    fn test_table_paragraphs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.docx");
        let table = Table::new(vec![TableRow::new(vec![
            TableCell::new().add_paragraph(paragraph("in a cell")),
        ])]);
        write_docx(
            &path,
            Docx::new()
                .add_paragraph(paragraph("before"))
                .add_table(table)
                .add_paragraph(paragraph("after")),
        );

        assert_eq!(extract_text(&path).unwrap(), "before\nafter\n");
    }

    #[test]
    fn test_not_a_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, b"plain text pretending to be a document").unwrap();

        assert!(matches!(
            extract_text(&path),
            Err(ExtractError::WordProcessor(_))
        ));
    }
}
