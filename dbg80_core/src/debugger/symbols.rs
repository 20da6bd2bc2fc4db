use crate::debugger::address::Address;
use crate::errors::DebuggerError;
use crate::expr::is_identifier;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of a symbol file: either a bare offset or a full record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymbolDef {
    Offset(u16),
    Record {
        #[serde(default)]
        offset: Option<u16>,
        #[serde(default)]
        annotation: Option<String>,
        #[serde(default)]
        comment: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub name: String,
    pub offset: Option<u16>,
    pub raw_annotation: Option<String>,
    pub annotation: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolGroup {
    pub module: String,
    pub base: u16,
    pub length: usize,
    by_name: BTreeMap<String, SymbolRecord>,
    // sorted by (offset, name)
    offsets: Vec<(u16, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatch {
    pub name: String,
    pub addr: u16,
    pub offset: u16,
    pub annotation: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SymbolLookup {
    pub exact: Option<SymbolMatch>,
    pub preceding: Option<SymbolMatch>,
    pub following: Option<SymbolMatch>,
}

#[derive(Debug, Deserialize)]
struct SymbolFile {
    module: String,
    #[serde(default)]
    base: u16,
    length: usize,
    #[serde(default)]
    symbols: BTreeMap<String, SymbolDef>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SymbolFileSet {
    One(SymbolFile),
    Many(Vec<SymbolFile>),
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SymbolTable {
    groups: Vec<SymbolGroup>,
}

impl SymbolGroup {
    fn contains(&self, addr: u16) -> bool {
        let addr = addr as usize;
        let base = self.base as usize;
        addr >= base && addr < base + self.length
    }

    fn insert(&mut self, name: String, def: SymbolDef) {
        let (offset, raw_annotation, comment) = match def {
            SymbolDef::Offset(offset) => (Some(offset), None, None),
            SymbolDef::Record {
                offset,
                annotation,
                comment,
            } => (offset, annotation, comment),
        };
        let annotation = raw_annotation.as_ref().map(|raw| raw.replace("\"\"", "\""));

        // names are looked up case-insensitively, so the first spelling wins
        let key = name.to_uppercase();
        if let Some(previous) = self.by_name.get(&key) {
            if previous.name != name {
                log::warn!(
                    "symbols: {} ignored in {}, clashes with {}",
                    name,
                    self.module,
                    previous.name
                );
                return;
            }
            if let Some(old) = previous.offset {
                self.offsets.retain(|entry| !(entry.0 == old && entry.1 == name));
            }
        }

        if let Some(offset) = offset {
            let sort_key = (offset, name.as_str());
            match self
                .offsets
                .binary_search_by(|entry| (entry.0, entry.1.as_str()).cmp(&sort_key))
            {
                Ok(_) => {}
                Err(pos) => self.offsets.insert(pos, (offset, name.clone())),
            }
        }

        self.by_name.insert(
            key,
            SymbolRecord {
                name,
                offset,
                raw_annotation,
                annotation,
                comment,
            },
        );
    }

    fn symbol_at(&self, index: usize) -> Option<SymbolMatch> {
        let (offset, ref name) = *self.offsets.get(index)?;
        let record = self.by_name.get(&name.to_uppercase());

        Some(SymbolMatch {
            name: name.trim_start_matches('.').to_string(),
            addr: self.base.wrapping_add(offset),
            offset,
            annotation: record.and_then(|r| r.annotation.clone()),
            comment: record.and_then(|r| r.comment.clone()),
        })
    }
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn add_group<I>(&mut self, module: &str, base: u16, length: usize, symbols: I)
    where
        I: IntoIterator<Item = (String, SymbolDef)>,
    {
        let mut group = SymbolGroup {
            module: module.to_string(),
            base,
            length,
            by_name: BTreeMap::new(),
            offsets: Vec::new(),
        };

        for (name, def) in symbols {
            group.insert(name, def);
        }

        log::debug!(
            "symbols: {} at {:04X}+{:X}, {} indexed",
            module,
            base,
            length,
            group.offsets.len()
        );
        self.groups.push(group);
    }

    /// Reads a symbol file holding one group or an array of groups.
    pub fn load_json(&mut self, text: &str) -> Result<usize, DebuggerError> {
        let files = match serde_json::from_str(text)? {
            SymbolFileSet::One(file) => vec![file],
            SymbolFileSet::Many(files) => files,
        };

        let count = files.len();
        for file in files {
            self.add_group(&file.module, file.base, file.length, file.symbols);
        }
        Ok(count)
    }

    pub fn find_by_address(&self, addr: &Address, nearest: bool) -> Option<SymbolLookup> {
        let addr = addr.get()?;
        let group = self.groups.iter().find(|group| group.contains(addr))?;
        let offset = addr.wrapping_sub(group.base);

        let mut lookup = SymbolLookup::default();
        match group.offsets.binary_search_by(|entry| entry.0.cmp(&offset)) {
            Ok(mut index) => {
                // first name at this offset
                while index > 0 && group.offsets[index - 1].0 == offset {
                    index -= 1;
                }
                lookup.exact = group.symbol_at(index);
            }
            Err(index) if nearest => {
                if index > 0 {
                    lookup.preceding = group.symbol_at(index - 1);
                }
                lookup.following = group.symbol_at(index);
            }
            Err(_) => return None,
        }

        if lookup == SymbolLookup::default() {
            None
        } else {
            Some(lookup)
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<Address> {
        if !is_identifier(name) {
            return None;
        }
        let key = name.to_uppercase();

        self.groups.iter().find_map(|group| {
            let record = group.by_name.get(&key)?;
            let offset = record.offset?;
            Some(Address::new(group.base.wrapping_add(offset)))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SymbolMatch)> + '_ {
        self.groups.iter().flat_map(|group| {
            (0..group.offsets.len()).filter_map(move |index| {
                group
                    .symbol_at(index)
                    .map(|symbol| (group.module.as_str(), symbol))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.add_group(
            "ROM",
            0x0000,
            0x100,
            vec![
                ("MIDDLE".to_string(), SymbolDef::Offset(0x10)),
                ("first".to_string(), SymbolDef::Offset(0x05)),
                ("Last".to_string(), SymbolDef::Offset(0x20)),
                (
                    "PLACEHOLDER".to_string(),
                    SymbolDef::Record {
                        offset: None,
                        annotation: Some("unused".to_string()),
                        comment: None,
                    },
                ),
            ],
        );
        table
    }

    #[test]
    fn offsets_stay_sorted() {
        let table = table();
        let offsets: Vec<u16> = table.iter().map(|(_, symbol)| symbol.offset).collect();
        assert_eq!(offsets, vec![0x05, 0x10, 0x20]);
    }

    #[test]
    fn exact_and_nearest_lookups() {
        let table = table();

        let exact = table.find_by_address(&Address::new(0x10), false).unwrap();
        assert_eq!(exact.exact.unwrap().name, "MIDDLE");

        assert!(table.find_by_address(&Address::new(0x0C), false).is_none());
        let nearest = table.find_by_address(&Address::new(0x0C), true).unwrap();
        assert!(nearest.exact.is_none());
        assert_eq!(nearest.preceding.unwrap().addr, 0x05);
        assert_eq!(nearest.following.unwrap().addr, 0x10);

        assert!(table.find_by_address(&Address::new(0x200), true).is_none());
        assert!(table.find_by_address(&Address::invalid(), true).is_none());
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        let table = table();
        assert_eq!(table.find_by_name("middle").unwrap().get(), Some(0x10));
        assert_eq!(table.find_by_name("LAST").unwrap().get(), Some(0x20));
        assert!(table.find_by_name("placeholder").is_none());
        assert!(table.find_by_name("1abc").is_none());
    }

    #[test]
    fn case_clashes_keep_the_first_spelling() {
        let mut table = SymbolTable::new();
        table.add_group(
            "ROM",
            0x0000,
            0x100,
            vec![
                (
                    "Init".to_string(),
                    SymbolDef::Record {
                        offset: Some(0x08),
                        annotation: Some("setup".to_string()),
                        comment: None,
                    },
                ),
                (
                    "INIT".to_string(),
                    SymbolDef::Record {
                        offset: Some(0x30),
                        annotation: Some("other".to_string()),
                        comment: None,
                    },
                ),
            ],
        );

        let names: Vec<String> = table.iter().map(|(_, symbol)| symbol.name).collect();
        assert_eq!(names, vec!["Init"]);
        assert_eq!(table.find_by_name("init").unwrap().get(), Some(0x08));

        let init = table
            .find_by_address(&Address::new(0x08), false)
            .and_then(|lookup| lookup.exact)
            .unwrap();
        assert_eq!(init.annotation.as_deref(), Some("setup"));
        assert!(table.find_by_address(&Address::new(0x30), false).is_none());
    }

    #[test]
    fn anonymous_symbols_are_ordered_but_not_named() {
        let mut table = SymbolTable::new();
        table.add_group(
            "RAM",
            0x4000,
            0x400,
            vec![
                (".loop".to_string(), SymbolDef::Offset(0x08)),
                ("BUFFER".to_string(), SymbolDef::Offset(0x10)),
            ],
        );

        assert!(table.find_by_name(".loop").is_none());
        let lookup = table.find_by_address(&Address::new(0x400A), true).unwrap();
        assert_eq!(lookup.preceding.unwrap().name, "loop");
        assert_eq!(lookup.following.unwrap().name, "BUFFER");
    }

    #[test]
    fn loads_symbol_files() {
        let text = r#"[
            { "module": "ROM", "base": 0, "length": 256,
              "symbols": { "START": 0,
                           "PRINT": { "offset": 32, "annotation": "say \"\"hi\"\"", "comment": "console" } } },
            { "module": "RAM", "base": 16384, "length": 1024, "symbols": {} }
        ]"#;

        let mut table = SymbolTable::new();
        assert_eq!(table.load_json(text).unwrap(), 2);
        assert_eq!(table.find_by_name("start").unwrap().get(), Some(0));

        let print = table
            .find_by_address(&Address::new(0x20), false)
            .and_then(|lookup| lookup.exact)
            .unwrap();
        assert_eq!(print.annotation.as_deref(), Some("say \"hi\""));
        assert_eq!(print.comment.as_deref(), Some("console"));

        assert!(table.load_json("{ \"module\": 1 }").is_err());
    }
}
