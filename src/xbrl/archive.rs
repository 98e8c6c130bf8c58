use crate::error::{DisclosureError, Result};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Upper bound on the buffer reserved from a member's declared size.
const MAX_PREALLOCATION: u64 = 64 << 20;

fn capacity_hint(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOCATION) as usize
}

/// Picks the instance document among `.xbrl` entries: anything under
/// `PublicDoc` first, then the shortest path, then lexicographic order.
pub fn choose_xbrl_member<'a, I>(names: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter(|name| name.to_lowercase().ends_with(".xbrl") && !name.ends_with('/'))
        .min_by_key(|name| {
            let lower = name.to_lowercase();
            (!lower.contains("publicdoc"), name.len(), lower)
        })
}

/// The selected instance member of an EDINET archive.
#[derive(Debug, Clone)]
pub struct XbrlMember {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub fn read_xbrl_member(zip_path: &Path) -> Result<XbrlMember> {
    if !zip_path.is_file() {
        return Err(DisclosureError::MissingInput(format!(
            "Zip file not found: {}",
            zip_path.display()
        )));
    }
    let file = File::open(zip_path)?;
    read_xbrl_member_from(file, zip_path)
}

pub fn read_xbrl_member_from<R: Read + Seek>(reader: R, zip_path: &Path) -> Result<XbrlMember> {
    let corrupt = |reason: String| DisclosureError::CorruptArchive {
        path: zip_path.to_path_buf(),
        reason,
    };

    let mut archive = ZipArchive::new(reader).map_err(|e| corrupt(e.to_string()))?;

    let name = choose_xbrl_member(archive.file_names())
        .map(str::to_string)
        .ok_or_else(|| DisclosureError::NoRelevantMember(zip_path.to_path_buf()))?;

    let mut entry = archive.by_name(&name).map_err(|e| corrupt(e.to_string()))?;
    let mut bytes = Vec::with_capacity(capacity_hint(entry.size()));
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| corrupt(e.to_string()))?;

    Ok(XbrlMember { name, bytes })
}
