//! Inventory vs. manifest diffing.

use kiosksync_inventory::Inventory;

/// Returns the paths that need transferring: present in `remote` but absent
/// from `local` or carrying a different hash. Local-only files are never
/// selected; deletion does not propagate. Output is sorted for stable
/// transfer ordering and logs.
pub fn diff(local: &Inventory, remote: &Inventory) -> Vec<String> {
    let mut wanted: Vec<String> = remote
        .iter()
        .filter(|(path, hash)| local.get(*path) != Some(*hash))
        .map(|(path, _)| path.clone())
        .collect();
    wanted.sort_unstable();
    wanted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(entries: &[(&str, &str)]) -> Inventory {
        entries
            .iter()
            .map(|(p, h)| (p.to_string(), h.to_string()))
            .collect()
    }

    #[test]
    fn missing_and_changed_files_selected() {
        let local = inv(&[("a.txt", "H1")]);
        let remote = inv(&[("a.txt", "H1"), ("b.bin", "H2")]);
        assert_eq!(diff(&local, &remote), vec!["b.bin"]);

        let local = inv(&[("a.txt", "OLD"), ("b.bin", "H2")]);
        assert_eq!(diff(&local, &remote), vec!["a.txt"]);
    }

    #[test]
    fn identical_inventories_diff_empty() {
        let both = inv(&[("a.txt", "H1"), ("audio/b.mp3", "H2")]);
        assert!(diff(&both, &both).is_empty());
    }

    #[test]
    fn local_only_files_untouched() {
        let local = inv(&[("a.txt", "H1"), ("kiosk_only.log", "H9")]);
        let remote = inv(&[("a.txt", "H1")]);
        assert!(diff(&local, &remote).is_empty());
    }

    #[test]
    fn empty_local_selects_everything() {
        let remote = inv(&[("b.bin", "H2"), ("a.txt", "H1")]);
        assert_eq!(diff(&Inventory::new(), &remote), vec!["a.txt", "b.bin"]);
    }

    #[test]
    fn diff_is_idempotent() {
        let local = inv(&[("a.txt", "H1")]);
        let remote = inv(&[("a.txt", "H2"), ("c.txt", "H3")]);
        assert_eq!(diff(&local, &remote), diff(&local, &remote));
    }
}
