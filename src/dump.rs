//! Format decoded messages for display (indented dump text) and convert between bytes and hex.

use crate::error::CodecError;
use crate::field::Field;
use crate::message::Message;

/// Space separated lowercase hex, e.g. `05 43 4f`.
pub fn to_hex(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Parse hex with optional whitespace between digits.
pub fn from_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    let digits: Vec<u8> = s.bytes().filter(|c| !c.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(CodecError::InvalidHex(format!("odd number of digits in {:?}", s)));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).map_err(|_| CodecError::InvalidHex(s.to_string()))?;
            u8::from_str_radix(text, 16).map_err(|_| CodecError::InvalidHex(format!("bad digits {:?}", text)))
        })
        .collect()
}

impl Field {
    /// Serialized bytes of the current value as hex.
    pub fn serialized_hex(&self) -> Result<String, CodecError> {
        self.serialized().map(|b| to_hex(&b))
    }

    /// [`Field::set_serialized`] from hex text.
    pub fn set_serialized_hex(&mut self, hex: &str) -> Result<(), CodecError> {
        let bytes = from_hex(hex)?;
        self.set_serialized(&bytes)
    }
}

/// Multi-line dump of a whole message.
pub fn dump_message(msg: &Message) -> String {
    let mut lines = vec![format!("{} (id {}, {} bytes)", msg.name(), msg.id(), msg.length())];
    if let Some(body) = msg.body().as_bundle() {
        for (name, field) in body.named_members() {
            dump_into(&mut lines, name, field, 1);
        }
    }
    lines.join("\n")
}

/// Multi-line dump of one field and its children.
pub fn dump_field(name: &str, field: &Field, indent: usize) -> String {
    let mut lines = Vec::new();
    dump_into(&mut lines, name, field, indent);
    lines.join("\n")
}

fn leaf(field: &Field, summary: String) -> String {
    let hex = field.serialized_hex().unwrap_or_else(|_| "?".to_string());
    let marker = if field.valid() { "" } else { " !invalid" };
    format!("{} <{}>{}", summary, hex, marker)
}

fn header(field: &Field, summary: String) -> String {
    if field.valid() {
        summary
    } else {
        format!("{} !invalid", summary)
    }
}

fn dump_into(lines: &mut Vec<String>, name: &str, field: &Field, indent: usize) {
    let pad = "  ".repeat(indent);
    match field {
        Field::Int(f) => {
            let summary = if f.def().scaling.is_some() {
                format!("{} ({})", f.scaled(), f.value())
            } else {
                f.value().to_string()
            };
            lines.push(format!("{}{}: {}", pad, name, leaf(field, summary)));
        }
        Field::Float(f) => lines.push(format!("{}{}: {}", pad, name, leaf(field, f.value().to_string()))),
        Field::Enum(f) => {
            let summary = match f.variant() {
                Some(v) => format!("{} ({})", v, f.value()),
                None => format!("{} (unknown {})", f.value(), f.def().name()),
            };
            lines.push(format!("{}{}: {}", pad, name, leaf(field, summary)));
        }
        Field::Bitmask(f) => {
            let summary = format!(
                "{:#0w$x} [{}]",
                f.value(),
                f.set_bit_names().join(", "),
                w = f.length() * 2 + 2
            );
            lines.push(format!("{}{}: {}", pad, name, leaf(field, summary)));
        }
        Field::Bitfield(f) => {
            lines.push(format!("{}{}: {}", pad, name, leaf(field, "bitfield".to_string())));
            for (member, value) in f.def().members().iter().zip(f.members()) {
                dump_into(lines, member.name(), value, indent + 1);
            }
        }
        Field::Bundle(f) => {
            lines.push(format!("{}{}: {}", pad, name, header(field, "{".to_string())));
            for (child_name, child) in f.named_members() {
                dump_into(lines, child_name, child, indent + 1);
            }
            lines.push(format!("{}}}", pad));
        }
        Field::Optional(f) => {
            if f.is_missing() {
                lines.push(format!("{}{}: <missing>", pad, name));
            } else {
                dump_into(lines, name, f.field(), indent);
            }
        }
        Field::List(f) => {
            lines.push(format!("{}{}: {}", pad, name, header(field, format!("[{}]", f.len()))));
            for (i, element) in f.elements().iter().enumerate() {
                dump_into(lines, &format!("[{}]", i), element, indent + 1);
            }
        }
        Field::Bytes(f) => {
            let summary = if f.def().is_text() {
                format!("{:?}", f.text())
            } else {
                format!("{} bytes", f.len())
            };
            lines.push(format!("{}{}: {}", pad, name, leaf(field, summary)));
        }
    }
}
