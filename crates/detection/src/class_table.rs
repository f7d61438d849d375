//! Detector class table

use contracts::{ClassDef, TrafficLightPhase};

/// Index → (name, colour, phase) lookup for detector output
#[derive(Debug, Clone)]
pub struct ClassTable {
    entries: Vec<ClassEntry>,
}

/// One class of the detection model
#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntry {
    pub name: String,
    pub color: [u8; 3],

    /// Phase the class selects, `None` for non-selecting classes (`off`, `Person`)
    pub phase: Option<TrafficLightPhase>,
}

impl ClassTable {
    pub fn new(classes: &[ClassDef]) -> Self {
        let entries = classes
            .iter()
            .map(|class| ClassEntry {
                name: class.name.clone(),
                color: class.color,
                phase: TrafficLightPhase::from_token(&class.name)
                    .filter(|phase| *phase != TrafficLightPhase::Off),
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, class_id: usize) -> Option<&ClassEntry> {
        self.entries.get(class_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new(&contracts::default_class_table())
    }
}
