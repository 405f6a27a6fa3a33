use crate::model::{ALL_TRACKS_PLAYLIST, Playlist, Track, display_title};
use anyhow::{Context, Result, bail};
use lofty::prelude::{Accessor, TaggedFileExt};
use lofty::probe::Probe;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3"];
pub const PLAYLIST_DESCRIPTOR: &str = "data.json";

/// Every playable file under `root`, sorted by path. Titles come from file
/// stems, authors from tags when the file has any.
pub fn scan_folder(root: &Path) -> Vec<Track> {
    let mut tracks = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio(path) {
            continue;
        }

        let title = path
            .file_stem()
            .and_then(OsStr::to_str)
            .map(display_title)
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| String::from("unknown"));

        tracks.push(Track {
            path: PathBuf::from(path),
            title,
            author: author_for(path),
        });
    }

    tracks.sort_by(|a, b| a.path.cmp(&b.path));
    tracks
}

/// The synthetic playlist holding everything in the music folder,
/// alphabetical. Files that share a title keep only the first path.
pub fn all_tracks_playlist(root: &Path) -> Playlist {
    let mut playlist = Playlist::with_tracks(ALL_TRACKS_PLAYLIST, scan_folder(root));
    playlist.sort_alphabetically();
    tracing::info!(root = %root.display(), tracks = playlist.len(), "scanned music folder");
    playlist
}

fn author_for(path: &Path) -> Option<String> {
    let tagged = Probe::open(path).and_then(|probe| probe.read()).ok()?;
    let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;
    tag.artist().and_then(|artist| clean_metadata_value(&artist))
}

fn clean_metadata_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

/// Playlists saved under `dir`, one sub-directory each. Unreadable
/// descriptors are logged and skipped.
pub fn load_playlists(dir: &Path) -> Vec<Playlist> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut playlists: Vec<Playlist> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path().join(PLAYLIST_DESCRIPTOR))
        .filter(|descriptor| descriptor.is_file())
        .filter_map(|descriptor| match load_playlist(&descriptor) {
            Ok(playlist) => Some(playlist),
            Err(err) => {
                tracing::warn!("skipping playlist: {err:#}");
                None
            }
        })
        .collect();
    playlists.sort_by_cached_key(|playlist| playlist.name.to_lowercase());
    playlists
}

pub fn load_playlist(descriptor: &Path) -> Result<Playlist> {
    let raw = fs::read_to_string(descriptor)
        .with_context(|| format!("failed to read {}", descriptor.display()))?;
    let playlist: Playlist = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", descriptor.display()))?;
    Ok(playlist)
}

pub fn save_playlist(dir: &Path, playlist: &Playlist) -> Result<PathBuf> {
    let folder = dir.join(playlist_folder_name(&playlist.name)?);
    fs::create_dir_all(&folder)
        .with_context(|| format!("failed to create {}", folder.display()))?;
    let descriptor = folder.join(PLAYLIST_DESCRIPTOR);
    let json = serde_json::to_string_pretty(playlist)?;
    fs::write(&descriptor, json)
        .with_context(|| format!("failed to write {}", descriptor.display()))?;
    Ok(descriptor)
}

pub fn delete_playlist(dir: &Path, name: &str) -> Result<()> {
    let folder = dir.join(playlist_folder_name(name)?);
    if !folder.exists() {
        return Ok(());
    }
    fs::remove_dir_all(&folder).with_context(|| format!("failed to remove {}", folder.display()))
}

/// Saves `playlist` under `new_name`, moving its folder along. When every
/// track sits inside the old folder the track paths follow the move.
pub fn rename_playlist(dir: &Path, playlist: &Playlist, new_name: &str) -> Result<Playlist> {
    let old_folder = dir.join(playlist_folder_name(&playlist.name)?);
    let new_folder = dir.join(playlist_folder_name(new_name)?);
    let mut renamed = playlist.clone();
    renamed.name = new_name.trim().to_string();

    if new_folder != old_folder {
        if new_folder.exists() {
            bail!("{} already exists", new_folder.display());
        }
        if old_folder.exists() {
            fs::rename(&old_folder, &new_folder).with_context(|| {
                format!(
                    "failed to move {} to {}",
                    old_folder.display(),
                    new_folder.display()
                )
            })?;
        }
        let stored_inside = !playlist.is_empty()
            && playlist
                .tracks
                .iter()
                .all(|track| track.path.starts_with(&old_folder));
        if stored_inside {
            renamed.relocate(&new_folder);
        }
    }

    save_playlist(dir, &renamed)?;
    tracing::info!(from = %playlist.name, to = %renamed.name, "playlist renamed");
    Ok(renamed)
}

fn playlist_folder_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        bail!("invalid playlist name {name:?}");
    }
    if trimmed.eq_ignore_ascii_case(ALL_TRACKS_PLAYLIST) {
        bail!("{ALL_TRACKS_PLAYLIST} is rebuilt from the music folder and cannot be saved");
    }
    Ok(trimmed.replace(['/', '\\'], "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scan_keeps_only_mp3_and_cleans_titles() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("nested")).expect("mkdir");
        fs::write(dir.path().join("Night_Drive.mp3"), b"x").expect("write mp3");
        fs::write(dir.path().join("nested/b.MP3"), b"x").expect("write mp3");
        fs::write(dir.path().join("cover.jpg"), b"x").expect("write jpg");
        fs::write(dir.path().join("notes.txt"), b"x").expect("write txt");

        let tracks = scan_folder(dir.path());
        let titles: Vec<&str> = tracks.iter().map(|track| track.title.as_str()).collect();
        assert_eq!(titles, vec!["Night Drive", "b"]);
        assert_eq!(tracks[0].author, None);
    }

    #[test]
    fn all_tracks_is_alphabetical() {
        let dir = tempdir().expect("tempdir");
        for name in ["zeta.mp3", "Alpha.mp3", "mid.mp3"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }
        let playlist = all_tracks_playlist(dir.path());
        assert_eq!(playlist.name, ALL_TRACKS_PLAYLIST);
        assert_eq!(playlist.titles(), vec!["Alpha", "mid", "zeta"]);
    }

    #[test]
    fn playlists_round_trip_through_descriptors() {
        let dir = tempdir().expect("tempdir");
        let mut road = Playlist::with_tracks(
            "Road trip",
            vec![
                Track::new("a", "/music/a.mp3"),
                Track::new("b", "/music/b.mp3"),
            ],
        );
        road.set_custom_order(&[String::from("b")]);
        let descriptor = save_playlist(dir.path(), &road).expect("save");
        assert!(descriptor.ends_with("Road trip/data.json"));
        save_playlist(dir.path(), &Playlist::new("chill")).expect("save");

        let loaded = load_playlists(dir.path());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "chill");
        assert_eq!(loaded[1], road);
    }

    #[test]
    fn broken_descriptor_is_skipped() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("broken")).expect("mkdir");
        fs::write(dir.path().join("broken").join(PLAYLIST_DESCRIPTOR), "{not json").expect("write");
        save_playlist(dir.path(), &Playlist::new("fine")).expect("save");

        let loaded = load_playlists(dir.path());
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "fine");
    }

    #[test]
    fn all_tracks_cannot_be_saved() {
        let dir = tempdir().expect("tempdir");
        assert!(save_playlist(dir.path(), &Playlist::new(ALL_TRACKS_PLAYLIST)).is_err());
        assert!(save_playlist(dir.path(), &Playlist::new("  ")).is_err());
    }

    #[test]
    fn delete_removes_the_folder() {
        let dir = tempdir().expect("tempdir");
        save_playlist(dir.path(), &Playlist::new("gone")).expect("save");
        delete_playlist(dir.path(), "gone").expect("delete");
        assert!(load_playlists(dir.path()).is_empty());
        delete_playlist(dir.path(), "gone").expect("second delete is fine");
    }

    #[test]
    fn rename_moves_the_folder_and_the_tracks_inside_it() {
        let dir = tempdir().expect("tempdir");
        let folder = dir.path().join("Road");
        fs::create_dir(&folder).expect("mkdir");
        fs::write(folder.join("a.mp3"), b"x").expect("write");
        let road = Playlist::with_tracks("Road", vec![Track::new("a", folder.join("a.mp3"))]);
        save_playlist(dir.path(), &road).expect("save");

        let renamed = rename_playlist(dir.path(), &road, " Highway ").expect("rename");
        assert_eq!(renamed.name, "Highway");
        assert_eq!(renamed.tracks[0].path, dir.path().join("Highway").join("a.mp3"));
        assert!(renamed.tracks[0].path.exists());
        assert!(!folder.exists());

        let loaded = load_playlists(dir.path());
        assert_eq!(loaded, vec![renamed]);
    }

    #[test]
    fn rename_keeps_paths_of_tracks_stored_elsewhere() {
        let dir = tempdir().expect("tempdir");
        let mix = Playlist::with_tracks("mix", vec![Track::new("a", "/music/a.mp3")]);
        save_playlist(dir.path(), &mix).expect("save");

        let renamed = rename_playlist(dir.path(), &mix, "blend").expect("rename");
        assert_eq!(renamed.tracks[0].path, PathBuf::from("/music/a.mp3"));
        assert_eq!(load_playlists(dir.path())[0].name, "blend");
    }

    #[test]
    fn rename_refuses_to_overwrite_another_playlist() {
        let dir = tempdir().expect("tempdir");
        let mix = Playlist::new("mix");
        save_playlist(dir.path(), &mix).expect("save");
        save_playlist(dir.path(), &Playlist::new("taken")).expect("save");

        assert!(rename_playlist(dir.path(), &mix, "taken").is_err());
        assert!(rename_playlist(dir.path(), &mix, ALL_TRACKS_PLAYLIST).is_err());
        assert_eq!(load_playlists(dir.path()).len(), 2);
    }

    #[test]
    fn missing_directory_has_no_playlists() {
        let dir = tempdir().expect("tempdir");
        assert!(load_playlists(&dir.path().join("nope")).is_empty());
    }
}
