use log::debug;

use crate::{data::ImportKind, errors::ParserError, tag::TagData, MacroTag, Parser};

/// `<:import path="dialogs/confirm.lml"/>` appends another template to the
/// reader. With `replace=name` (or a second positional attribute) every
/// `{name}` in the imported text is replaced with the macro body first.
#[derive(Debug)]
pub struct ImportMacro {
    data: TagData,
    kind: ImportKind,
}

impl ImportMacro {
    pub fn new(data: TagData, kind: ImportKind) -> Self {
        Self { data, kind }
    }
}

impl MacroTag for ImportMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let attributes = &self.data.attributes;
        let Some(path) = attributes.get_or_position("path", 0) else {
            return parser.error_if_strict(ParserError::InvalidAttributes {
                tag: self.data.name.clone(),
                message: "missing path".to_string(),
            });
        };
        let path = parser.parse_string(path)?;
        let template = parser.data().read_template(self.kind, &path)?;
        let template = match attributes.get_or_position("replace", 1) {
            Some(replace) => {
                let body = self.data.body();
                parser
                    .syntax()
                    .substitute(&template, |placeholder| placeholder.eq_ignore_ascii_case(replace).then(|| body.to_string()))
            }
            None => template,
        };
        debug!("Importing {:?} template '{}'", self.kind, path);
        parser.append(&template, &path);
        Ok(())
    }
}
