//! Per-branch paths and naming

use crate::config::DataLayout;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchLayout {
    /// 1-based branch index
    pub index: u32,
    /// `<PREFIJO_FICHEROS><NNN>`, also the filename prefix of the branch's files
    pub code: String,
    pub inbox: PathBuf,
    pub processing_dir: PathBuf,
}

impl BranchLayout {
    pub fn new(layout: &DataLayout, index: u32) -> Self {
        let inbox = layout
            .data_root
            .join(&layout.branches_dir)
            .join(format!("{}{:03}", layout.branch_dir_prefix, index));
        let processing_dir = inbox.join(format!("{}{:03}", layout.processing_prefix, index));

        Self {
            index,
            code: format!("{}{:03}", layout.file_prefix, index),
            inbox,
            processing_dir,
        }
    }

    /// Layouts for branches `1..=count`
    pub fn all(layout: &DataLayout, count: u32) -> Vec<Self> {
        (1..=count).map(|i| Self::new(layout, i)).collect()
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;

    #[test]
    fn test_branch_paths() {
        let store = ConfigStore::from_pairs([("PATH_FILES", "/data")]);
        let layout = DataLayout::from_store(&store);
        let branch = BranchLayout::new(&layout, 3);

        assert_eq!(branch.code, "SU003");
        assert_eq!(branch.inbox, PathBuf::from("/data/files_data/Sucursal003"));
        assert_eq!(
            branch.processing_dir,
            PathBuf::from("/data/files_data/Sucursal003/procesados003")
        );
    }

    #[test]
    fn test_accepts_only_own_prefix() {
        let layout = DataLayout::from_store(&ConfigStore::default());
        let branch = BranchLayout::new(&layout, 1);
        assert!(branch.accepts("SU001_OPE_1.csv"));
        assert!(!branch.accepts("SU002_OPE_1.csv"));
        assert!(!branch.accepts("notes.txt"));
    }

    #[test]
    fn test_all_is_one_based() {
        let layout = DataLayout::from_store(&ConfigStore::default());
        let branches = BranchLayout::all(&layout, 2);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].code, "SU001");
        assert_eq!(branches[1].code, "SU002");
    }
}
