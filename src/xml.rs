//! XML wire format.
//!
//! Requests and responses are flat documents under an `<xml>` root element:
//!
//! ```text
//! <xml><appid><![CDATA[wx2421b1c4370ec43b]]></appid><total_fee>100</total_fee>...</xml>
//! ```

use crate::errors::{Result, WeChatPayError};
use crate::types::{ParamValue, Params, Record};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// Root element name of every request and response document.
pub const ROOT: &str = "xml";

/// Serializes a parameter set and its signature into an `<xml>` document.
///
/// Fields are written in key order with `sign` last. Text goes into CDATA sections,
/// integers are written as plain text.
///
/// # Examples
///
/// ```
/// use wechatpay_rs::types::Params;
/// use wechatpay_rs::xml::to_xml;
///
/// let params = Params::new().with("body", "test").with("total_fee", 1);
/// let doc = to_xml(&params, "ABC").unwrap();
/// assert_eq!(
///     doc,
///     "<xml><body><![CDATA[test]]></body><total_fee>1</total_fee><sign><![CDATA[ABC]]></sign></xml>"
/// );
/// ```
pub fn to_xml(params: &Params, sign: &str) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write(&mut writer, Event::Start(BytesStart::new(ROOT)))?;

    for (key, value) in params.iter() {
        match value {
            ParamValue::Text(text) => write_text_field(&mut writer, key, text)?,
            ParamValue::Integer(n) => write_field(&mut writer, key, Event::Text(BytesText::new(&n.to_string())))?,
        }
    }
    write_text_field(&mut writer, "sign", sign)?;

    write(&mut writer, Event::End(BytesEnd::new(ROOT)))?;
    String::from_utf8(writer.into_inner()).map_err(|e| WeChatPayError::Xml(e.to_string()))
}

fn write_text_field(writer: &mut Writer<Vec<u8>>, key: &str, text: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(key)))?;
    // A CDATA section cannot contain its own terminator, so `]]>` is split
    // across two adjacent sections: `]]` ends one, `>` starts the next.
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        write(writer, Event::CData(BytesCData::new(&rest[..pos + 2])))?;
        rest = &rest[pos + 2..];
    }
    write(writer, Event::CData(BytesCData::new(rest)))?;
    write(writer, Event::End(BytesEnd::new(key)))
}

fn write_field(writer: &mut Writer<Vec<u8>>, key: &str, content: Event<'_>) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(key)))?;
    write(writer, content)?;
    write(writer, Event::End(BytesEnd::new(key)))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| WeChatPayError::Xml(e.to_string()))
}

/// Parses an `<xml>` document into a flat record.
///
/// Each child of the root becomes one field holding its text, with CDATA and entity
/// escapes decoded. Content nested deeper than the root's children is ignored.
///
/// Returns `InvalidPayload` if the body is not well-formed XML or its root element
/// is not `<xml>`.
///
/// # Examples
///
/// ```
/// use wechatpay_rs::xml::from_xml;
///
/// let record = from_xml("<xml><return_code><![CDATA[SUCCESS]]></return_code></xml>").unwrap();
/// assert_eq!(record.get("return_code"), Some("SUCCESS"));
///
/// assert!(from_xml("not xml").is_err());
/// ```
pub fn from_xml(body: &str) -> Result<Record> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut record = Record::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut field: Option<(String, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                match depth {
                    0 => open_root(&name, &mut seen_root)?,
                    1 => field = Some((name, String::new())),
                    _ => {}
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(&e);
                match depth {
                    0 => open_root(&name, &mut seen_root)?,
                    1 => record.insert(name, String::new()),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return Err(invalid("unexpected closing tag"));
                }
                if depth == 2 {
                    if let Some((name, text)) = field.take() {
                        record.insert(name, text);
                    }
                }
                depth -= 1;
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| invalid(&e.to_string()))?;
                push_text(depth, &mut field, &text)?;
            }
            Ok(Event::CData(e)) => {
                let text = std::str::from_utf8(&e).map_err(|e| invalid(&e.to_string()))?;
                push_text(depth, &mut field, text)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(invalid(&e.to_string())),
        }
    }

    if !seen_root {
        return Err(invalid("missing <xml> root element"));
    }
    if depth != 0 {
        return Err(invalid("unclosed element"));
    }
    Ok(record)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn open_root(name: &str, seen_root: &mut bool) -> Result<()> {
    if *seen_root {
        return Err(invalid("more than one root element"));
    }
    if name != ROOT {
        return Err(invalid(&format!("unexpected root element <{}>", name)));
    }
    *seen_root = true;
    Ok(())
}

fn push_text(depth: usize, field: &mut Option<(String, String)>, text: &str) -> Result<()> {
    match depth {
        0 if !text.is_empty() => Err(invalid("text outside of root element")),
        2 => {
            if let Some((_, value)) = field.as_mut() {
                value.push_str(text);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn invalid(reason: &str) -> WeChatPayError {
    WeChatPayError::InvalidPayload(format!("malformed XML: {}", reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_xml_splits_cdata_terminator() {
        let params = Params::new().with("attach", "a]]>b");
        let doc = to_xml(&params, "S").unwrap();
        assert!(doc.contains("<attach><![CDATA[a]]]]><![CDATA[>b]]></attach>"));

        let record = from_xml(&doc).unwrap();
        assert_eq!(record.get("attach"), Some("a]]>b"));
    }

    #[test]
    fn test_cdata_terminator_keeps_surrounding_whitespace() {
        let values = ["  a]]>b  ", "]]>", " ]]>]]> ", "x]]]>y", "\n]]>\t"];
        for value in values {
            let params = Params::new().with("attach", value);
            let record = from_xml(&to_xml(&params, "S").unwrap()).unwrap();
            assert_eq!(record.get("attach"), Some(value), "value {:?}", value);
        }
    }

    #[test]
    fn test_encode_decode_preserves_fields() {
        let params = Params::new()
            .with("body", "腾讯充值中心-QQ会员充值")
            .with("detail", "<b>&amp;</b>")
            .with("total_fee", 888)
            .with("out_trade_no", "1217752501201407033233368018");

        let record = from_xml(&to_xml(&params, "SIGN").unwrap()).unwrap();

        assert_eq!(record.len(), params.len() + 1);
        for (key, value) in params.iter() {
            assert_eq!(record.get(key), Some(value.to_string().as_str()));
        }
        assert_eq!(record.get("sign"), Some("SIGN"));
    }

    #[test]
    fn test_from_xml_gateway_response() {
        let body = r#"<xml>
   <return_code><![CDATA[SUCCESS]]></return_code>
   <return_msg><![CDATA[OK]]></return_msg>
   <appid><![CDATA[wx2421b1c4370ec43b]]></appid>
   <nonce_str><![CDATA[IITRi8Iabbblz1Jc]]></nonce_str>
   <result_code><![CDATA[SUCCESS]]></result_code>
   <prepay_id><![CDATA[wx201411101639507cbf6ffd8b0779950874]]></prepay_id>
   <trade_type>JSAPI</trade_type>
</xml>"#;
        let record = from_xml(body).unwrap();
        assert_eq!(record.len(), 7);
        assert_eq!(record.get("trade_type"), Some("JSAPI"));
        assert_eq!(record.get("prepay_id"), Some("wx201411101639507cbf6ffd8b0779950874"));
    }

    #[test]
    fn test_from_xml_declaration_and_empty_fields() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?><xml><a/><b></b><c>x</c></xml>"#;
        let record = from_xml(body).unwrap();
        assert_eq!(record.get("a"), Some(""));
        assert_eq!(record.get("b"), Some(""));
        assert_eq!(record.get("c"), Some("x"));
    }

    #[test]
    fn test_from_xml_ignores_nested_content() {
        let body = "<xml><a>1</a><coupons><c>2</c></coupons></xml>";
        let record = from_xml(body).unwrap();
        assert_eq!(record.get("a"), Some("1"));
        assert_eq!(record.get("coupons"), Some(""));
        assert!(!record.contains_key("c"));
    }

    #[test]
    fn test_from_xml_rejects_non_documents() {
        assert!(from_xml("not xml").is_err());
        assert!(from_xml("").is_err());
        assert!(from_xml("<root><a>1</a></root>").is_err());
        assert!(from_xml("<xml><a>1</a>").is_err());
        assert!(from_xml("<xml><a>1</b></xml>").is_err());
        assert!(from_xml("<xml></xml><xml></xml>").is_err());
    }
}
