//! Completion-certificate PDF synthesis.
//!
//! Builds a minimal, self-contained single-page PDF summarising a completed
//! submission: template name, signer, timestamps, and the submitted field
//! values. Offsets and the xref table are computed by hand; the output is
//! plain PDF 1.4 with a built-in Helvetica font and no compression.

use chrono::{DateTime, Utc};

use locum_core::{
  submission::Submission,
  template::Template,
};

/// Render the certificate for a completed submission.
pub fn completion_certificate(
  submission: &Submission,
  template: Option<&Template>,
) -> Vec<u8> {
  let mut lines = Vec::new();

  lines.push(format!("Signed Submission {}", submission.id));
  match template {
    Some(t) => lines.push(format!("Template: {} ({})", t.name, t.id)),
    None => lines.push(format!("Template: {}", submission.template_id)),
  }
  if let Some(at) = submission.completed_at {
    lines.push(format!("Completed at: {}", format_ts(at)));
  }

  lines.push(String::new());
  for submitter in &submission.submitters {
    match &submitter.name {
      Some(name) => lines.push(format!("Signer: {name} <{}>", submitter.email)),
      None => lines.push(format!("Signer: {}", submitter.email)),
    }
    if let Some(values) = &submitter.values {
      for (field, value) in values {
        lines.push(format!("  {field}: {}", render_value(value)));
      }
    }
  }

  build_pdf(&lines)
}

fn format_ts(ts: DateTime<Utc>) -> String {
  ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn render_value(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

// ─── PDF assembly ────────────────────────────────────────────────────────────

/// Escape text for a PDF literal string.
fn escape_text(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '(' | ')' | '\\' => {
        out.push('\\');
        out.push(c);
      }
      c if c.is_ascii() && !c.is_control() => out.push(c),
      // Non-ASCII falls outside the built-in encoding; keep it legible.
      _ => out.push('?'),
    }
  }
  out
}

fn build_pdf(lines: &[String]) -> Vec<u8> {
  let mut content = String::from("BT\n/F1 11 Tf\n14 TL\n72 720 Td\n");
  for (i, line) in lines.iter().enumerate() {
    if i > 0 {
      content.push_str("T*\n");
    }
    content.push('(');
    content.push_str(&escape_text(line));
    content.push_str(") Tj\n");
  }
  content.push_str("ET\n");

  let objects = [
    "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
    "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
     /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
      .to_string(),
    format!(
      "<< /Length {} >>\nstream\n{content}endstream",
      content.len()
    ),
    "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
  ];

  let mut buf = Vec::new();
  buf.extend_from_slice(b"%PDF-1.4\n");

  let mut offsets = Vec::with_capacity(objects.len());
  for (i, body) in objects.iter().enumerate() {
    offsets.push(buf.len());
    buf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
  }

  let xref_offset = buf.len();
  buf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
  buf.extend_from_slice(b"0000000000 65535 f \n");
  for offset in &offsets {
    buf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
  }
  buf.extend_from_slice(
    format!(
      "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
      objects.len() + 1
    )
    .as_bytes(),
  );

  buf
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use chrono::Utc;
  use locum_core::submission::{Submission, SubmissionStatus, Submitter};

  use super::*;

  fn completed_submission() -> Submission {
    let mut submitter = Submitter::new("nurse@example.com");
    submitter.name = Some("Pat (RN)".into());
    let mut values = BTreeMap::new();
    values.insert(
      "full_name".to_string(),
      serde_json::Value::String("Pat Doe \\ (locum)".into()),
    );
    submitter.values = Some(values);

    Submission {
      id:           "sub_test".into(),
      template_id:  "template_001".into(),
      status:       SubmissionStatus::Completed,
      submitters:   vec![submitter],
      created_at:   Utc::now(),
      sent_at:      Some(Utc::now()),
      completed_at: Some(Utc::now()),
      expires_at:   None,
      metadata:     BTreeMap::new(),
    }
  }

  #[test]
  fn output_is_a_pdf_document() {
    let bytes = completion_certificate(&completed_submission(), None);
    assert!(bytes.starts_with(b"%PDF-1.4"));
    assert!(bytes.ends_with(b"%%EOF\n"));
  }

  #[test]
  fn parens_and_backslashes_are_escaped() {
    let bytes = completion_certificate(&completed_submission(), None);
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("Pat \\(RN\\)"));
    assert!(text.contains("\\\\ \\(locum\\)"));
  }

  #[test]
  fn xref_offsets_point_at_objects() {
    let bytes = completion_certificate(&completed_submission(), None);
    let text = String::from_utf8_lossy(&bytes);

    // Each xref entry must point at the "N 0 obj" header it describes.
    let xref_at = text.find("xref\n").expect("xref table");
    for (i, line) in text[xref_at..]
      .lines()
      .skip(3) // "xref", "0 6", free entry
      .take(5)
      .enumerate()
    {
      let offset: usize = line[..10].parse().expect("offset");
      let header = format!("{} 0 obj", i + 1);
      assert!(
        text[offset..].starts_with(&header),
        "entry {i} points at {offset}, not at {header:?}"
      );
    }
  }
}
