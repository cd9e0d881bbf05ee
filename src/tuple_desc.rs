use crate::field::FieldType;

/// Ordered schema of a table: a sequence of `(field_type, field_name)`
/// pairs. Fixed width, derived by summing each field's width.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleDesc {
    fields: Vec<(FieldType, String)>,
}

impl TupleDesc {
    pub fn new(fields: Vec<(FieldType, String)>) -> Self {
        Self { fields }
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, i: usize) -> FieldType {
        self.fields[i].0
    }

    pub fn field_name(&self, i: usize) -> &str {
        &self.fields[i].1
    }

    /// Total width in bytes of one serialized tuple under this schema.
    pub fn width_bytes(&self) -> usize {
        self.fields.iter().map(|(t, _)| t.width()).sum()
    }

    /// Byte offset of field `i` within a serialized tuple.
    pub(crate) fn field_offset(&self, i: usize) -> usize {
        self.fields[..i].iter().map(|(t, _)| t.width()).sum()
    }

    pub fn fields(&self) -> impl Iterator<Item = (FieldType, &str)> {
        self.fields.iter().map(|(t, n)| (*t, n.as_str()))
    }
}

/// Convenience constructor grounded in the teacher's
/// `simple_int_tuple_scheme`: an all-`INT` schema with generated names,
/// used heavily by tests.
pub fn simple_int_tuple_desc(width: usize, name_prefix: &str) -> TupleDesc {
    let fields = (0..width)
        .map(|i| (FieldType::Int, format!("{}-{}", name_prefix, i)))
        .collect();
    TupleDesc::new(fields)
}
