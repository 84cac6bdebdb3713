/// How a worksheet cell stores its value, taken from the cell's `t` attribute.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    /// Numbers, booleans, dates and anything else kept as literal `<v>` text
    #[default]
    Literal,
    /// Index into the shared string table
    SharedString,
    /// Text stored in the cell itself (`<is>` or a formula string result)
    InlineString,
}

impl CellType {
    /// Maps the `t` attribute of a `<c>` element to a cell type.
    pub(crate) fn from_attribute(kind: Option<&str>) -> Self {
        match kind {
            Some("s") => Self::SharedString,
            Some("inlineStr") | Some("str") => Self::InlineString,
            _ => Self::Literal,
        }
    }
}
