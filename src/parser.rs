//! Parse protocol definition source into the AST using PEST.

use crate::ast::*;
use crate::bitfield::BitOrder;
use crate::checksum::ChecksumAlgorithm;
use crate::endian::Endian;
use crate::float::FloatType;
use crate::frame::LayerKind;
use crate::int::IntType;
use crate::optional::OptionalMode;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct ProtocolParser;

/// Parse protocol source into AST.
pub fn parse(source: &str) -> Result<ProtocolFile, String> {
    let pairs = ProtocolParser::parse(Rule::protocol, source).map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_protocol(pair)
}

fn build_protocol(pair: Pair<Rule>) -> Result<ProtocolFile, String> {
    let mut file = ProtocolFile::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::endian_decl => {
                if file.endian.is_some() {
                    return Err("endian declared more than once".to_string());
                }
                let e = inner.into_inner().next().ok_or("endian: missing value")?;
                file.endian = Some(parse_endian(e.as_str())?);
            }
            Rule::frame_section => {
                if file.frame.is_some() {
                    return Err("frame declared more than once".to_string());
                }
                file.frame = Some(build_frame(inner)?);
            }
            Rule::enum_section => file.enums.push(build_enum_section(inner)?),
            Rule::struct_section => file.structs.push(build_struct(inner)?),
            Rule::message_section => file.messages.push(build_message(inner)?),
            _ => {}
        }
    }
    Ok(file)
}

// ==================== Literals ====================

fn parse_int(s: &str) -> Result<i64, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).map(|v| v as i64)
    } else if let Some(bin) = s.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).map(|v| v as i64)
    } else {
        s.parse::<i64>().or_else(|_| s.parse::<u64>().map(|v| v as i64))
    };
    parsed.map_err(|e| format!("invalid integer {}: {}", s, e))
}

fn parse_u64(s: &str) -> Result<u64, String> {
    if s.starts_with('-') {
        return Err(format!("expected a non-negative integer, got {}", s));
    }
    parse_int(s).map(|v| v as u64)
}

fn parse_usize(s: &str) -> Result<usize, String> {
    usize::try_from(parse_u64(s)?).map_err(|_| format!("{} is too large", s))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    u32::try_from(parse_u64(s)?).map_err(|_| format!("{} is too large", s))
}

fn parse_float(s: &str) -> Result<f64, String> {
    s.parse::<f64>().map_err(|e| format!("invalid number {}: {}", s, e))
}

fn parse_endian(s: &str) -> Result<Endian, String> {
    match s {
        "big" => Ok(Endian::Big),
        "little" => Ok(Endian::Little),
        other => Err(format!("unknown endian {}", other)),
    }
}

fn parse_int_type(s: &str) -> Result<IntType, String> {
    Ok(match s {
        "u8" => IntType::U8,
        "u16" => IntType::U16,
        "u32" => IntType::U32,
        "u64" => IntType::U64,
        "i8" => IntType::I8,
        "i16" => IntType::I16,
        "i32" => IntType::I32,
        "i64" => IntType::I64,
        other => return Err(format!("unknown integer type {}", other)),
    })
}

/// Literal arguments of an option rule, in order.
fn literals(pair: Pair<Rule>) -> Vec<String> {
    pair.into_inner().map(|p| p.as_str().to_string()).collect()
}

fn two<T>(args: &[String], what: &str, f: impl Fn(&str) -> Result<T, String>) -> Result<(T, T), String> {
    match args {
        [a, b] => Ok((f(a)?, f(b)?)),
        _ => Err(format!("{} takes two arguments", what)),
    }
}

fn one<T>(args: &[String], what: &str, f: impl Fn(&str) -> Result<T, String>) -> Result<T, String> {
    match args {
        [a] => f(a),
        _ => Err(format!("{} takes one argument", what)),
    }
}

// ==================== Types ====================

fn build_int_spec(pair: Pair<Rule>) -> Result<IntSpec, String> {
    let mut inner = pair.into_inner();
    let ty_pair = inner.next().ok_or("int: missing type")?;
    let ty = parse_int_type(ty_pair.as_str())?;
    let mut options = Vec::new();
    for opt in inner {
        let rule = opt.as_rule();
        let option = match rule {
            Rule::strict_opt => IntOption::Strict,
            Rule::endian_opt => {
                let e = opt.into_inner().next().ok_or("endian: missing value")?;
                IntOption::Endian(parse_endian(e.as_str())?)
            }
            _ => {
                let args = literals(opt);
                match rule {
                    Rule::len_opt => IntOption::Len(one(&args, "len", parse_usize)?),
                    Rule::bits_opt => IntOption::Bits(one(&args, "bits", parse_u32)?),
                    Rule::varlen_opt => {
                        let (min, max) = two(&args, "varlen", parse_usize)?;
                        IntOption::VarLen(min, max)
                    }
                    Rule::scale_opt => {
                        let (num, den) = two(&args, "scale", parse_int)?;
                        IntOption::Scale(num, den)
                    }
                    Rule::offset_opt => IntOption::Offset(one(&args, "offset", parse_int)?),
                    Rule::range_opt => {
                        let (lo, hi) = two(&args, "range", parse_int)?;
                        IntOption::Range(lo, hi)
                    }
                    Rule::default_opt => IntOption::Default(one(&args, "default", parse_int)?),
                    other => return Err(format!("unexpected integer option {:?}", other)),
                }
            }
        };
        options.push(option);
    }
    Ok(IntSpec { ty, options })
}

fn build_float_spec(pair: Pair<Rule>) -> Result<FloatSpec, String> {
    let mut spec = FloatSpec {
        ty: FloatType::F64,
        endian: None,
        ranges: Vec::new(),
        default: None,
    };
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::float_type => {
                spec.ty = if inner.as_str() == "f32" {
                    FloatType::F32
                } else {
                    FloatType::F64
                }
            }
            Rule::endian_opt => {
                let e = inner.into_inner().next().ok_or("endian: missing value")?;
                spec.endian = Some(parse_endian(e.as_str())?);
            }
            Rule::frange_opt => spec.ranges.push(two(&literals(inner), "range", parse_float)?),
            Rule::fdefault_opt => spec.default = Some(one(&literals(inner), "default", parse_float)?),
            _ => {}
        }
    }
    Ok(spec)
}

fn build_bitmask_spec(pair: Pair<Rule>) -> Result<BitmaskSpec, String> {
    let mut spec = BitmaskSpec::default();
    let mut inner = pair.into_inner();
    let len = inner.next().ok_or("bitmask: missing length")?;
    spec.len = parse_usize(len.as_str())?;
    for opt in inner {
        match opt.as_rule() {
            Rule::endian_opt => {
                let e = opt.into_inner().next().ok_or("endian: missing value")?;
                spec.endian = Some(parse_endian(e.as_str())?);
            }
            Rule::reserved_opt => {
                let args = literals(opt);
                spec.reserved = Some(match args.as_slice() {
                    [mask] => (parse_u64(mask)?, 0),
                    [mask, value] => (parse_u64(mask)?, parse_u64(value)?),
                    _ => return Err("reserved takes a mask and an optional value".to_string()),
                });
            }
            Rule::strict_opt => spec.strict = true,
            Rule::default_opt => spec.default = Some(one(&literals(opt), "default", parse_u64)?),
            Rule::bit_names => {
                for bit in opt.into_inner() {
                    let mut it = bit.into_inner();
                    let name = it.next().ok_or("bit name: missing name")?.as_str().to_string();
                    let idx = it.next().ok_or("bit name: missing index")?;
                    spec.bits.push((name, parse_u32(idx.as_str())?));
                }
            }
            _ => {}
        }
    }
    Ok(spec)
}

fn build_bitfield_spec(pair: Pair<Rule>) -> Result<BitfieldSpec, String> {
    let mut spec = BitfieldSpec {
        order: BitOrder::LsbFirst,
        endian: None,
        members: Vec::new(),
    };
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::bit_order => {
                spec.order = if inner.as_str() == "msb_first" {
                    BitOrder::MsbFirst
                } else {
                    BitOrder::LsbFirst
                }
            }
            Rule::endian_opt => {
                let e = inner.into_inner().next().ok_or("endian: missing value")?;
                spec.endian = Some(parse_endian(e.as_str())?);
            }
            Rule::bit_member => spec.members.push(build_bit_member(inner)?),
            _ => {}
        }
    }
    Ok(spec)
}

fn build_bit_member(pair: Pair<Rule>) -> Result<BitMemberSpec, String> {
    let mut name = String::new();
    let mut ty = None;
    let mut bits = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::member_type => {
                let t = inner.into_inner().next().ok_or("bitfield member: missing type")?;
                ty = Some(match t.as_rule() {
                    Rule::int_spec => TypeSpec::Int(build_int_spec(t)?),
                    Rule::bitmask_spec => TypeSpec::Bitmask(build_bitmask_spec(t)?),
                    Rule::struct_ref => TypeSpec::Named(t.as_str().trim().to_string()),
                    other => return Err(format!("unexpected bitfield member type {:?}", other)),
                });
            }
            Rule::int_lit => bits = Some(parse_u32(inner.as_str())?),
            _ => {}
        }
    }
    Ok(BitMemberSpec {
        ty: ty.ok_or_else(|| format!("bitfield member {}: missing type", name))?,
        name,
        bits,
    })
}

fn build_optional_spec(pair: Pair<Rule>) -> Result<OptionalSpec, String> {
    let mut inner_ty = None;
    let mut mode = None;
    let mut when = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_spec => inner_ty = Some(build_type_spec(inner)?),
            Rule::presence_mode => {
                mode = Some(match inner.as_str() {
                    "exists" => OptionalMode::Exists,
                    "missing" => OptionalMode::Missing,
                    _ => OptionalMode::Tentative,
                })
            }
            Rule::when_opt => {
                let mut it = inner.into_inner();
                let control = it.next().ok_or("when: missing field")?.as_str().to_string();
                let bit = it.next().ok_or("when: missing bit")?;
                when = Some((control, parse_u32(bit.as_str())?));
            }
            _ => {}
        }
    }
    Ok(OptionalSpec {
        inner: Box::new(inner_ty.ok_or("optional: missing type")?),
        mode,
        when,
    })
}

fn build_size_spec(pair: Pair<Rule>) -> Result<SizeSpec, String> {
    let inner = pair.into_inner().next().ok_or("empty size")?;
    let rule = inner.as_rule();
    let arg = inner.into_inner().next().ok_or("size: missing argument")?;
    match rule {
        Rule::count_from => Ok(SizeSpec::CountFrom(arg.as_str().to_string())),
        Rule::count_size => Ok(SizeSpec::Count(build_int_spec(arg)?)),
        Rule::length_size => Ok(SizeSpec::Length(build_int_spec(arg)?)),
        Rule::fixed_size => Ok(SizeSpec::Fixed(parse_usize(arg.as_str())?)),
        Rule::until_size => Ok(SizeSpec::Until(build_int_spec(arg)?)),
        other => Err(format!("unexpected size {:?}", other)),
    }
}

fn optional_size(pair: Pair<Rule>) -> Result<Option<SizeSpec>, String> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::size_spec)
        .map(build_size_spec)
        .transpose()
}

fn build_type_spec(pair: Pair<Rule>) -> Result<TypeSpec, String> {
    let inner = pair.into_inner().next().ok_or("Empty type_spec")?;
    match inner.as_rule() {
        Rule::int_spec => Ok(TypeSpec::Int(build_int_spec(inner)?)),
        Rule::float_spec => Ok(TypeSpec::Float(build_float_spec(inner)?)),
        Rule::bitmask_spec => Ok(TypeSpec::Bitmask(build_bitmask_spec(inner)?)),
        Rule::bitfield_spec => Ok(TypeSpec::Bitfield(build_bitfield_spec(inner)?)),
        Rule::bundle_spec => {
            let fields = inner
                .into_inner()
                .filter(|p| p.as_rule() == Rule::field)
                .map(build_field)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TypeSpec::Bundle(fields))
        }
        Rule::optional_spec => Ok(TypeSpec::Optional(build_optional_spec(inner)?)),
        Rule::list_spec => {
            let mut element = None;
            let mut size = None;
            for p in inner.into_inner() {
                match p.as_rule() {
                    Rule::type_spec => element = Some(build_type_spec(p)?),
                    Rule::size_spec => size = Some(build_size_spec(p)?),
                    _ => {}
                }
            }
            Ok(TypeSpec::List(Box::new(element.ok_or("list: missing element type")?), size))
        }
        Rule::bytes_spec => Ok(TypeSpec::Bytes(optional_size(inner)?)),
        Rule::string_spec => Ok(TypeSpec::String(optional_size(inner)?)),
        Rule::struct_ref => Ok(TypeSpec::Named(inner.as_str().trim().to_string())),
        other => Err(format!("Unhandled type rule: {:?}", other)),
    }
}

fn build_field(pair: Pair<Rule>) -> Result<FieldSpec, String> {
    let mut name = String::new();
    let mut ty = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::type_spec => ty = Some(build_type_spec(inner)?),
            _ => {}
        }
    }
    Ok(FieldSpec {
        ty: ty.ok_or_else(|| format!("field {}: missing type", name))?,
        name,
    })
}

// ==================== Sections ====================

fn build_enum_section(pair: Pair<Rule>) -> Result<EnumSection, String> {
    let mut name = String::new();
    let mut base = None;
    let mut variants = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::int_spec => base = Some(build_int_spec(inner)?),
            Rule::enum_variant => {
                let mut it = inner.into_inner();
                let var_name = it.next().ok_or("enum variant: name")?.as_str().to_string();
                let lit = it.next().ok_or("enum variant: value")?;
                variants.push((var_name, parse_int(lit.as_str())?));
            }
            _ => {}
        }
    }
    Ok(EnumSection {
        base: base.ok_or_else(|| format!("enum {}: missing base type", name))?,
        name,
        variants,
    })
}

fn build_struct(pair: Pair<Rule>) -> Result<StructSection, String> {
    let mut name = String::new();
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::field => fields.push(build_field(inner)?),
            _ => {}
        }
    }
    Ok(StructSection { name, fields })
}

fn build_message(pair: Pair<Rule>) -> Result<MessageSection, String> {
    let mut name = String::new();
    let mut id = None;
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::int_lit => id = Some(parse_u64(inner.as_str())?),
            Rule::field => fields.push(build_field(inner)?),
            _ => {}
        }
    }
    Ok(MessageSection {
        id: id.ok_or_else(|| format!("message {}: missing id", name))?,
        name,
        fields,
    })
}

fn parse_layer_kind(s: &str) -> Result<LayerKind, String> {
    Ok(match s {
        "sync" => LayerKind::Sync,
        "size" => LayerKind::Size,
        "id" => LayerKind::Id,
        "payload" => LayerKind::Payload,
        other => return Err(format!("unknown layer {}", other)),
    })
}

fn build_frame(pair: Pair<Rule>) -> Result<Vec<LayerSpec>, String> {
    let mut layers = Vec::new();
    for layer in pair.into_inner() {
        let rule = layer.as_rule();
        let spec = match rule {
            Rule::sync_layer => {
                let bytes = layer
                    .into_inner()
                    .map(|p| {
                        let v = parse_u64(p.as_str())?;
                        u8::try_from(v).map_err(|_| format!("sync byte {} out of range", p.as_str()))
                    })
                    .collect::<Result<Vec<u8>, String>>()?;
                LayerSpec::Sync(bytes)
            }
            Rule::size_layer | Rule::id_layer => {
                let spec = build_int_spec(layer.into_inner().next().ok_or("layer: missing type")?)?;
                if rule == Rule::size_layer {
                    LayerSpec::Size(spec)
                } else {
                    LayerSpec::Id(spec)
                }
            }
            Rule::payload_layer => LayerSpec::Payload,
            Rule::checksum_layer => {
                let mut it = layer.into_inner();
                let algorithm = match it.next().ok_or("checksum: missing algorithm")?.as_str() {
                    "sum" => ChecksumAlgorithm::Sum,
                    "crc16" => ChecksumAlgorithm::Crc16Ccitt,
                    _ => ChecksumAlgorithm::Crc32,
                };
                let field = build_int_spec(it.next().ok_or("checksum: missing type")?)?;
                let from = it.next().map(|p| parse_layer_kind(p.as_str())).transpose()?;
                LayerSpec::Checksum { algorithm, field, from }
            }
            _ => continue,
        };
        layers.push(spec);
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_literals() {
        assert_eq!(parse_int("0x1F"), Ok(31));
        assert_eq!(parse_int("0b101"), Ok(5));
        assert_eq!(parse_int("-7"), Ok(-7));
        assert_eq!(parse_int("0xFFFFFFFFFFFFFFFF"), Ok(-1));
        assert!(parse_u64("-1").is_err());
    }
}
