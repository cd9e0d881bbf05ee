use std::fmt;
use std::sync::Arc;

use crate::field::Field;
use crate::page_id::RecordId;
use crate::tuple_desc::TupleDesc;

/// A tuple bound to a [`TupleDesc`]. Carries an optional `RecordId`
/// once it has been materialized from (or inserted into) a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    tuple_desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(tuple_desc: Arc<TupleDesc>, fields: Vec<Field>) -> Self {
        debug_assert_eq!(tuple_desc.num_fields(), fields.len());
        Self {
            tuple_desc,
            fields,
            record_id: None,
        }
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.tuple_desc
    }

    pub fn get_field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn set_field(&mut self, i: usize, field: Field) {
        self.fields[i] = field;
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: RecordId) {
        self.record_id = Some(record_id);
    }

    pub(crate) fn decode(tuple_desc: Arc<TupleDesc>, bytes: &[u8]) -> Self {
        let mut fields = Vec::with_capacity(tuple_desc.num_fields());
        for i in 0..tuple_desc.num_fields() {
            let field_type = tuple_desc.field_type(i);
            let offset = tuple_desc.field_offset(i);
            let width = field_type.width();
            fields.push(Field::decode(field_type, &bytes[offset..offset + width]));
        }
        Self {
            tuple_desc,
            fields,
            record_id: None,
        }
    }

    pub(crate) fn encode_into(&self, buf: &mut [u8]) {
        for (i, field) in self.fields.iter().enumerate() {
            let offset = self.tuple_desc.field_offset(i);
            let width = field.field_type().width();
            field.encode_into(&mut buf[offset..offset + width]);
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, ")")
    }
}
