//! Message parser: raw `.eml` bytes into headers plus a MIME part tree.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::{ForensicError, Result};
use crate::model::message::{BodyPart, ParsedMessage, PartContent, RawMessage};
use crate::parser::header;

/// Maximum depth for recursive multipart descent (adversarial input guard).
const MAX_DEPTH: usize = 32;

/// Parse a raw message into a [`ParsedMessage`].
///
/// Fails with `MalformedMessage` when the input is empty, has no blank line
/// between headers and body, carries no valid header field, or is rejected
/// by the MIME parser.
pub fn parse_message(raw: &RawMessage) -> Result<ParsedMessage> {
    parse_bytes(raw.bytes())
}

/// Parse raw message bytes. See [`parse_message`].
pub fn parse_bytes(data: &[u8]) -> Result<ParsedMessage> {
    let message_bytes = skip_from_line(data);
    if message_bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ForensicError::MalformedMessage("message is empty".into()));
    }

    let header_end = find_header_end(message_bytes).ok_or_else(|| {
        ForensicError::MalformedMessage("no blank line separating headers from body".into())
    })?;

    let header_text = header::decode_header_bytes(&message_bytes[..header_end]);
    let headers = header::unfold_headers(&header_text);
    if headers.is_empty() {
        return Err(ForensicError::MalformedMessage(
            "no valid header fields".into(),
        ));
    }

    let parsed = MessageParser::default().parse(message_bytes).ok_or_else(|| {
        ForensicError::MalformedMessage("MIME structure could not be parsed".into())
    })?;

    let body = convert_part(&parsed, 0, 0)?;
    debug!(
        headers = headers.len(),
        root_type = %body.content_type,
        "Parsed message"
    );

    Ok(ParsedMessage { headers, body })
}

/// Convert one `mail-parser` part (and its children) into a [`BodyPart`].
fn convert_part(msg: &Message<'_>, id: usize, depth: usize) -> Result<BodyPart> {
    let part = msg
        .parts
        .get(id)
        .ok_or_else(|| ForensicError::MalformedMessage(format!("MIME part {id} is missing")))?;

    let content = match &part.body {
        PartType::Text(text) | PartType::Html(text) => PartContent::Text(text.to_string()),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            PartContent::Binary(bytes.to_vec())
        }
        // Attached messages are evidence of their own and are not descended into
        PartType::Message(nested) => PartContent::Binary(nested.raw_message().to_vec()),
        PartType::Multipart(children) => {
            if depth >= MAX_DEPTH {
                warn!(depth, "Multipart nesting too deep, ignoring children");
                PartContent::Multipart(Vec::new())
            } else {
                PartContent::Multipart(
                    children
                        .iter()
                        .map(|&child| convert_part(msg, child, depth + 1))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
        }
    };

    Ok(BodyPart {
        content_type: mime_type(part),
        is_attachment: is_attachment(part),
        content,
    })
}

/// Lower-cased `type/subtype` of a part, defaulted from its decoded kind.
fn mime_type(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct: &mail_parser::ContentType| {
            let main = ct.ctype();
            match ct.subtype() {
                Some(sub) => format!("{main}/{sub}"),
                None => main.to_string(),
            }
        })
        .map(|ct| ct.to_ascii_lowercase())
        .unwrap_or_else(|| {
            match &part.body {
                PartType::Html(_) => "text/html",
                PartType::Text(_) => "text/plain",
                PartType::Message(_) => "message/rfc822",
                PartType::Multipart(_) => "multipart/mixed",
                PartType::Binary(_) | PartType::InlineBinary(_) => "application/octet-stream",
            }
            .to_string()
        })
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .map(|d: &mail_parser::ContentType| d.ctype().eq_ignore_ascii_case("attachment"))
        .unwrap_or(false)
}

/// Skip a UTF-8 BOM and an mbox `From ` separator line, if present.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Find the byte offset where headers end (start of the first blank line).
///
/// Accepts LF, CRLF and mixed line endings.
fn find_header_end(data: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    for (i, &b) in data.iter().enumerate() {
        if b != b'\n' {
            continue;
        }
        let line = &data[line_start..i];
        if line.is_empty() || line == b"\r" {
            return Some(line_start);
        }
        line_start = i + 1;
    }
    None
}
