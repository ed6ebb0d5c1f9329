// Fixed-width record arena: slots are cleared and refilled between records, not reallocated.

/// One logical row. Slots past `len()` have not been parsed yet; a `None` slot is a null field.
#[derive(Clone, Debug, Default)]
pub struct Record {
    slots: Vec<Option<String>>,
    parsed: usize,
}

impl Record {
    pub fn new(fields: Vec<Option<String>>) -> Self {
        let parsed = fields.len();
        Self {
            slots: fields,
            parsed,
        }
    }

    pub fn from_strs(fields: &[&str]) -> Self {
        Self::new(fields.iter().map(|field| Some(field.to_string())).collect())
    }

    pub fn len(&self) -> usize {
        self.parsed
    }

    pub fn is_empty(&self) -> bool {
        self.parsed == 0
    }

    /// Field text; `None` for null slots and out-of-range indexes.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields().get(index).and_then(|slot| slot.as_deref())
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.fields().get(index), Some(None))
    }

    pub fn fields(&self) -> &[Option<String>] {
        &self.slots[..self.parsed]
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.fields().iter().map(|slot| slot.as_deref())
    }

    pub fn to_vec(&self) -> Vec<Option<String>> {
        self.fields().to_vec()
    }

    /// Copy holding only the parsed slots.
    pub fn snapshot(&self) -> Record {
        Record::new(self.to_vec())
    }

    pub(crate) fn begin(&mut self, field_count: usize) {
        if self.slots.len() < field_count {
            self.slots.resize_with(field_count, || None);
        }
        self.parsed = 0;
    }

    /// Cleared buffer for the next field.
    pub(crate) fn next_slot(&mut self) -> &mut String {
        if self.parsed == self.slots.len() {
            self.slots.push(None);
        }
        let slot = self.slots[self.parsed].get_or_insert_with(String::new);
        slot.clear();
        self.parsed += 1;
        slot
    }

    pub(crate) fn fill_empty(&mut self, field_count: usize) {
        while self.parsed < field_count {
            self.next_slot();
        }
    }

    pub(crate) fn fill_null(&mut self, field_count: usize) {
        if self.slots.len() < field_count {
            self.slots.resize_with(field_count, || None);
        }
        while self.parsed < field_count {
            self.slots[self.parsed] = None;
            self.parsed += 1;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.parsed = 0;
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields() == other.fields()
    }
}

impl Eq for Record {}
