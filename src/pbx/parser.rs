//! Hand-rolled reader for the build-manifest format.
//!
//! The format is an ASCII property-list subset: one outer dictionary whose
//! `objects` entry holds record definitions grouped into comment-delimited
//! sections. The reader is a single-pass cursor over the buffer; it records
//! byte spans for everything an editing operation might need to touch and
//! parses the rest (nested settings dictionaries) only for balance.

use crate::ident::ObjectId;
use crate::pbx::errors::PbxError;
use crate::pbx::model::{Attr, AttrValue, ListEntry, PbxDocument, PbxList, Record, Section, Span};

/// Parse a complete manifest buffer into a document model.
pub fn parse(content: &str) -> Result<PbxDocument, PbxError> {
    Parser::new(content).parse_document()
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn parse_document(&mut self) -> Result<PbxDocument, PbxError> {
        let mut doc = PbxDocument::default();

        self.expect(b'{', "opening brace")?;
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let (key, _) = self.read_key()?;
                    self.expect(b'=', "'='")?;
                    if key == "objects" {
                        doc.sections = self.parse_objects()?;
                    } else {
                        let value = self.parse_value()?;
                        doc.attrs.push(Attr { key, value });
                    }
                    self.expect(b';', "';'")?;
                }
                None => return Err(self.syntax(self.pos, "unexpected end of input")),
            }
        }

        self.skip_trivia();
        if self.pos != self.src.len() {
            return Err(self.syntax(self.pos, "trailing content after closing brace"));
        }
        Ok(doc)
    }

    /// Parse the object table: `{ ... }` with records grouped by section
    /// markers. Consumes through the closing brace.
    fn parse_objects(&mut self) -> Result<Vec<Section>, PbxError> {
        self.expect(b'{', "opening brace of object table")?;

        let mut sections: Vec<Section> = Vec::new();
        let mut open: Option<Section> = None;

        loop {
            self.skip_ws();
            if self.at_block_comment() {
                let (text, span) = self.read_block_comment()?;
                if let Some(name) = marker_name(&text, "Begin ") {
                    if let Some(prev) = &open {
                        return Err(self.syntax(
                            span.start,
                            &format!("section {} opened inside section {}", name, prev.name),
                        ));
                    }
                    open = Some(Section {
                        name: name.to_string(),
                        begin_span: span,
                        body_start: self.line_end_after(span.end),
                        end_span: span, // patched when the end marker is seen
                        records: Vec::new(),
                    });
                } else if let Some(name) = marker_name(&text, "End ") {
                    match open.take() {
                        Some(mut section) if section.name == name => {
                            section.end_span = span;
                            sections.push(section);
                        }
                        Some(section) => {
                            return Err(self.syntax(
                                span.start,
                                &format!(
                                    "end marker for {} closes section {}",
                                    name, section.name
                                ),
                            ));
                        }
                        None => {
                            return Err(self.syntax(
                                span.start,
                                &format!("end marker for {} without a begin marker", name),
                            ));
                        }
                    }
                }
                // Any other comment here is stray; ignore it.
                continue;
            }

            match self.peek() {
                Some(b'}') => {
                    if let Some(section) = &open {
                        return Err(self.syntax(
                            self.pos,
                            &format!("section {} is missing its end marker", section.name),
                        ));
                    }
                    self.pos += 1;
                    return Ok(sections);
                }
                Some(_) => {
                    let record = self.parse_record()?;
                    match &mut open {
                        Some(section) => section.records.push(record),
                        None => {
                            return Err(self.syntax(
                                record.span.start,
                                "object definition outside any section",
                            ))
                        }
                    }
                }
                None => return Err(self.syntax(self.pos, "unterminated object table")),
            }
        }
    }

    /// Parse one `ID /* comment */ = { ... };` definition. The cursor sits at
    /// the identifier; the returned span covers whole lines.
    fn parse_record(&mut self) -> Result<Record, PbxError> {
        let (word, word_span) = self.read_word()?;
        let id = ObjectId::parse(&word)
            .map_err(|_| self.syntax(word_span.start, "expected a 24-hex object identifier"))?;

        self.skip_ws();
        let comment = if self.at_block_comment() {
            Some(self.read_block_comment()?.0)
        } else {
            None
        };

        self.expect(b'=', "'='")?;
        self.expect(b'{', "'{'")?;
        let attrs = self.parse_attrs()?;
        self.expect(b'}', "'}'")?;
        self.expect(b';', "';'")?;

        let span = Span::new(
            self.line_start_before(word_span.start),
            self.line_end_after(self.pos),
        );
        Ok(Record {
            id,
            comment,
            attrs,
            span,
        })
    }

    /// Parse `key = value;` pairs up to (not including) a closing brace.
    fn parse_attrs(&mut self) -> Result<Vec<Attr>, PbxError> {
        let mut attrs = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b'}') | None => return Ok(attrs),
                Some(_) => {
                    let (key, _) = self.read_key()?;
                    self.expect(b'=', "'='")?;
                    let value = self.parse_value()?;
                    self.expect(b';', "';'")?;
                    attrs.push(Attr { key, value });
                }
            }
        }
    }

    fn parse_value(&mut self) -> Result<AttrValue, PbxError> {
        self.skip_trivia();
        match self.peek() {
            Some(b'{') => {
                // Nested dictionary (build settings and the like): parse for
                // balance, discard the contents.
                self.pos += 1;
                let _ = self.parse_attrs()?;
                self.expect(b'}', "'}'")?;
                Ok(AttrValue::Dict)
            }
            Some(b'(') => Ok(AttrValue::List(self.parse_list()?)),
            Some(_) => {
                let (value, _) = self.read_scalar_token()?;
                self.skip_ws();
                let comment = if self.at_block_comment() {
                    Some(self.read_block_comment()?.0)
                } else {
                    None
                };
                Ok(AttrValue::Scalar { value, comment })
            }
            None => Err(self.syntax(self.pos, "unexpected end of input in value position")),
        }
    }

    /// Parse `( entry, entry, ... )`. Dictionary entries are consumed for
    /// balance but not retained; nothing edits them.
    fn parse_list(&mut self) -> Result<PbxList, PbxError> {
        self.skip_trivia();
        let open = self.pos;
        self.expect(b'(', "'('")?;

        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b')') => {
                    let close = self.pos;
                    self.pos += 1;
                    return Ok(PbxList {
                        open,
                        close,
                        entries,
                    });
                }
                Some(b',') => {
                    // Separator, or a stray duplicate; either way it is not
                    // part of any entry.
                    self.pos += 1;
                }
                Some(b'{') => {
                    self.pos += 1;
                    let _ = self.parse_attrs()?;
                    self.expect(b'}', "'}'")?;
                }
                Some(_) => {
                    let (value, value_span) = self.read_scalar_token()?;
                    let mut end = value_span.end;
                    self.skip_ws();
                    let comment = if self.at_block_comment() {
                        let (text, span) = self.read_block_comment()?;
                        end = span.end;
                        Some(text)
                    } else {
                        None
                    };
                    entries.push(ListEntry {
                        value,
                        comment,
                        span: Span::new(value_span.start, end),
                    });
                }
                None => return Err(self.syntax(self.pos, "unterminated list")),
            }
        }
    }

    /// A key is a bare word or a quoted string.
    fn read_key(&mut self) -> Result<(String, Span), PbxError> {
        self.read_scalar_token()
    }

    fn read_scalar_token(&mut self) -> Result<(String, Span), PbxError> {
        self.skip_trivia();
        match self.peek() {
            Some(b'"') => self.read_string(),
            Some(_) => self.read_word(),
            None => Err(self.syntax(self.pos, "unexpected end of input")),
        }
    }

    /// Run of bare-token bytes: everything up to whitespace, a structural
    /// delimiter, or a comment opener.
    fn read_word(&mut self) -> Result<(String, Span), PbxError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            let delimiter = matches!(
                b,
                b' ' | b'\t' | b'\n' | b'\r' | b'{' | b'}' | b'(' | b')' | b'=' | b';' | b',' | b'"'
            );
            if delimiter || self.at_block_comment() {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.syntax(start, "expected a token"));
        }
        let span = Span::new(start, self.pos);
        Ok((self.src[start..self.pos].to_string(), span))
    }

    /// Quoted string with backslash escapes. Returns the decoded value; the
    /// span covers the quotes.
    fn read_string(&mut self) -> Result<(String, Span), PbxError> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok((value, Span::new(start, self.pos)));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'n') => value.push('\n'),
                        Some(b't') => value.push('\t'),
                        Some(b'r') => value.push('\r'),
                        Some(b'"') => value.push('"'),
                        Some(b'\\') => value.push('\\'),
                        Some(other) => value.push(other as char),
                        None => return Err(self.syntax(start, "unterminated string")),
                    }
                    self.pos += 1;
                }
                Some(_) => {
                    let c = self.src[self.pos..].chars().next().unwrap();
                    value.push(c);
                    self.pos += c.len_utf8();
                }
                None => return Err(self.syntax(start, "unterminated string")),
            }
        }
    }

    /// Block comment `/* ... */`. Returns the trimmed inner text and the span
    /// of the whole token.
    fn read_block_comment(&mut self) -> Result<(String, Span), PbxError> {
        let start = self.pos;
        self.pos += 2; // "/*"
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.bytes.get(self.pos + 1) == Some(&b'/') {
                let inner = self.src[start + 2..self.pos].trim().to_string();
                self.pos += 2;
                return Ok((inner, Span::new(start, self.pos)));
            }
            self.pos += 1;
        }
        Err(self.syntax(start, "unterminated comment"))
    }

    fn at_block_comment(&self) -> bool {
        self.bytes.get(self.pos) == Some(&b'/') && self.bytes.get(self.pos + 1) == Some(&b'*')
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8, what: &str) -> Result<(), PbxError> {
        self.skip_trivia();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.syntax(self.pos, &format!("expected {what}")))
        }
    }

    /// Whitespace only.
    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Whitespace and `//` line comments (the encoding header).
    fn skip_trivia(&mut self) {
        loop {
            self.skip_ws();
            if self.bytes.get(self.pos) == Some(&b'/') && self.bytes.get(self.pos + 1) == Some(&b'/')
            {
                while let Some(b) = self.peek() {
                    self.pos += 1;
                    if b == b'\n' {
                        break;
                    }
                }
            } else {
                return;
            }
        }
    }

    /// Start of `offset`'s line, provided only indentation precedes it.
    fn line_start_before(&self, offset: usize) -> usize {
        let mut i = offset;
        while i > 0 {
            match self.bytes[i - 1] {
                b'\n' => return i,
                b' ' | b'\t' => i -= 1,
                _ => return offset,
            }
        }
        0
    }

    /// End of `offset`'s line (just past the newline), provided only trailing
    /// whitespace follows it.
    fn line_end_after(&self, offset: usize) -> usize {
        let mut i = offset;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\n' => return i + 1,
                b' ' | b'\t' | b'\r' => i += 1,
                _ => return offset,
            }
        }
        i
    }

    fn syntax(&self, offset: usize, message: &str) -> PbxError {
        PbxError::Syntax {
            offset,
            message: message.to_string(),
        }
    }
}

/// If `text` is a section marker of the given kind, return the section name.
fn marker_name<'a>(text: &'a str, kind: &str) -> Option<&'a str> {
    text.strip_prefix(kind)?.strip_suffix(" section")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mini_manifest() -> String {
        [
            "// !$*UTF8*$!",
            "{",
            "\tarchiveVersion = 1;",
            "\tobjectVersion = 46;",
            "\tobjects = {",
            "",
            "/* Begin PBXFileReference section */",
            "\t\t0123456789ABCDEF01234567 /* A.m */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.c.objc; name = A.m; path = Sources/A.m; sourceTree = SOURCE_ROOT; };",
            "/* End PBXFileReference section */",
            "",
            "/* Begin PBXSourcesBuildPhase section */",
            "\t\tFEDCBA9876543210FEDCBA98 /* Sources */ = {",
            "\t\t\tisa = PBXSourcesBuildPhase;",
            "\t\t\tbuildActionMask = 2147483647;",
            "\t\t\tfiles = (",
            "\t\t\t\t0123456789ABCDEF01234567 /* A.m in Sources */,",
            "\t\t\t);",
            "\t\t\trunOnlyForDeploymentPostprocessing = 0;",
            "\t\t};",
            "/* End PBXSourcesBuildPhase section */",
            "\t};",
            "\trootObject = AAAAAAAAAAAAAAAAAAAAAAAA /* Project object */;",
            "}",
            "",
        ]
        .join("\n")
    }

    #[test]
    fn test_parses_sections_and_records() {
        let content = mini_manifest();
        let doc = parse(&content).unwrap();

        assert_eq!(doc.sections.len(), 2);
        let refs = doc.section("PBXFileReference").unwrap();
        assert_eq!(refs.records.len(), 1);

        let record = &refs.records[0];
        assert_eq!(record.id.as_str(), "0123456789ABCDEF01234567");
        assert_eq!(record.comment.as_deref(), Some("A.m"));
        assert_eq!(record.isa(), Some("PBXFileReference"));
        assert_eq!(record.attr("path"), Some("Sources/A.m"));
        assert_eq!(record.attr("missing"), None);
    }

    #[test]
    fn test_record_span_covers_whole_lines() {
        let content = mini_manifest();
        let doc = parse(&content).unwrap();
        let record = &doc.section("PBXFileReference").unwrap().records[0];

        let text = record.span.slice(&content);
        assert!(text.starts_with("\t\t0123456789ABCDEF01234567"));
        assert!(text.ends_with("};\n"));
    }

    #[test]
    fn test_multiline_record_and_list_entries() {
        let content = mini_manifest();
        let doc = parse(&content).unwrap();
        let phase = &doc.section("PBXSourcesBuildPhase").unwrap().records[0];

        let files = phase.list("files").unwrap();
        assert_eq!(files.entries.len(), 1);
        let entry = &files.entries[0];
        assert_eq!(entry.value, "0123456789ABCDEF01234567");
        assert_eq!(entry.comment.as_deref(), Some("A.m in Sources"));
        assert_eq!(
            entry.span.slice(&content),
            "0123456789ABCDEF01234567 /* A.m in Sources */"
        );
        assert_eq!(&content[files.close..files.close + 1], ")");
    }

    #[test]
    fn test_body_start_follows_begin_marker_line() {
        let content = mini_manifest();
        let doc = parse(&content).unwrap();
        let section = doc.section("PBXFileReference").unwrap();
        assert!(content[..section.body_start].ends_with("/* Begin PBXFileReference section */\n"));
    }

    #[test]
    fn test_document_attrs_and_root_object() {
        let content = mini_manifest();
        let doc = parse(&content).unwrap();
        let root = doc.attrs.iter().find(|a| a.key == "rootObject").unwrap();
        match &root.value {
            AttrValue::Scalar { value, comment } => {
                assert_eq!(value, "AAAAAAAAAAAAAAAAAAAAAAAA");
                assert_eq!(comment.as_deref(), Some("Project object"));
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_dangling_ids_found() {
        let content = mini_manifest();
        let doc = parse(&content).unwrap();
        let dangling = doc.dangling_ids();
        assert_eq!(dangling.len(), 1);
        assert_eq!(
            dangling.iter().next().unwrap().as_str(),
            "AAAAAAAAAAAAAAAAAAAAAAAA"
        );
    }

    #[test]
    fn test_quoted_scalars_are_decoded() {
        let content = concat!(
            "{\n\tobjects = {\n/* Begin PBXGroup section */\n",
            "\t\t0123456789ABCDEF01234567 /* Files */ = {isa = PBXGroup; children = (\n",
            "\t\t); name = \"Some Files\"; sourceTree = \"<group>\"; };\n",
            "/* End PBXGroup section */\n\t};\n}\n"
        );
        let doc = parse(content).unwrap();
        let group = &doc.section("PBXGroup").unwrap().records[0];
        assert_eq!(group.attr("name"), Some("Some Files"));
        assert_eq!(group.attr("sourceTree"), Some("<group>"));
    }

    #[test]
    fn test_nested_dict_is_balanced_not_retained() {
        let content = concat!(
            "{\n\tobjects = {\n/* Begin XCBuildConfiguration section */\n",
            "\t\t0123456789ABCDEF01234567 /* Debug */ = {\n",
            "\t\t\tisa = XCBuildConfiguration;\n",
            "\t\t\tbuildSettings = {\n",
            "\t\t\t\tGCC_PREPROCESSOR_DEFINITIONS = (\n",
            "\t\t\t\t\t\"DEBUG=1\",\n",
            "\t\t\t\t\t\"$(inherited)\",\n",
            "\t\t\t\t);\n",
            "\t\t\t\tPRODUCT_NAME = \"$(TARGET_NAME)\";\n",
            "\t\t\t};\n",
            "\t\t\tname = Debug;\n",
            "\t\t};\n",
            "/* End XCBuildConfiguration section */\n\t};\n}\n"
        );
        let doc = parse(content).unwrap();
        let config = &doc.section("XCBuildConfiguration").unwrap().records[0];
        assert_eq!(config.attr("name"), Some("Debug"));
        assert!(matches!(
            config
                .attrs
                .iter()
                .find(|a| a.key == "buildSettings")
                .map(|a| &a.value),
            Some(AttrValue::Dict)
        ));
    }

    #[test]
    fn test_non_identifier_list_entries() {
        let content = concat!(
            "{\n\tobjects = {\n/* Begin PBXProject section */\n",
            "\t\t0123456789ABCDEF01234567 /* Project object */ = {\n",
            "\t\t\tisa = PBXProject;\n",
            "\t\t\tknownRegions = (\n",
            "\t\t\t\ten,\n",
            "\t\t\t\tBase,\n",
            "\t\t\t);\n",
            "\t\t};\n",
            "/* End PBXProject section */\n\t};\n}\n"
        );
        let doc = parse(content).unwrap();
        let project = &doc.section("PBXProject").unwrap().records[0];
        let regions = project.list("knownRegions").unwrap();
        assert_eq!(regions.entries.len(), 2);
        assert!(regions.entries.iter().all(|e| e.object_id().is_none()));
    }

    #[test]
    fn test_list_without_trailing_comma() {
        let content = concat!(
            "{\n\tobjects = {\n/* Begin PBXGroup section */\n",
            "\t\t0123456789ABCDEF01234567 /* Files */ = {isa = PBXGroup; children = (\n",
            "\t\t\tAAAAAAAAAAAAAAAAAAAAAAAA /* A.m */\n",
            "\t\t); sourceTree = \"<group>\"; };\n",
            "/* End PBXGroup section */\n\t};\n}\n"
        );
        let doc = parse(content).unwrap();
        let group = &doc.section("PBXGroup").unwrap().records[0];
        assert_eq!(group.list("children").unwrap().entries.len(), 1);
    }

    #[test]
    fn test_record_outside_section_rejected() {
        let content = concat!(
            "{\n\tobjects = {\n",
            "\t\t0123456789ABCDEF01234567 /* A.m */ = {isa = PBXFileReference; };\n",
            "\t};\n}\n"
        );
        let err = parse(content).unwrap_err();
        assert!(matches!(err, PbxError::Syntax { .. }), "{err}");
    }

    #[test]
    fn test_mismatched_end_marker_rejected() {
        let content = concat!(
            "{\n\tobjects = {\n/* Begin PBXGroup section */\n",
            "/* End PBXFileReference section */\n\t};\n}\n"
        );
        assert!(parse(content).is_err());
    }

    #[test]
    fn test_unterminated_comment_rejected() {
        let content = "{\n\tobjects = {\n/* Begin PBXGroup section \n\t};\n}\n";
        assert!(parse(content).is_err());
    }

    #[test]
    fn test_malformed_identifier_rejected() {
        let content = concat!(
            "{\n\tobjects = {\n/* Begin PBXGroup section */\n",
            "\t\tnotanid /* A.m */ = {isa = PBXGroup; };\n",
            "/* End PBXGroup section */\n\t};\n}\n"
        );
        assert!(parse(content).is_err());
    }
}
