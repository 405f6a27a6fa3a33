//! Line-oriented front end for the playback controller.

use crate::config::{self, ConfigPaths};
use crate::controller::{ControllerOptions, PlaybackController};
use crate::library;
use crate::model::{ALL_TRACKS_PLAYLIST, PlaybackMode, Playlist, Theme};
use crate::session::{DecodeBackend, TrackOpener};
use crate::stats::{self, ChartKind, DEFAULT_CHART_LEN};
use crate::view::{HeadlessView, PlayerView};
use anyhow::{Context, Result, bail};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

const HELP: &str = "\
Commands:
  list | open <playlist> | tracks | select <title>
  play [title] | toggle | next | prev | seek <0-100> | stop | status
  mode [sequential|repeat|random] | queue [clear] | enqueue <title> | top <title>
  dequeue <title> | reorder <title> | <title> ... | arrange <title> | <title> ...
  playlist <new|add|drop|delete> <name> | playlist rename <old> | <new>
  sort <alpha|original>
  stats [tracks|playlists] | theme [dark|light] | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Alphabetical,
    Original,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Open(String),
    Tracks,
    Select(String),
    Play(Option<String>),
    Toggle,
    Next,
    Previous,
    Seek(i32),
    Stop,
    Mode(Option<PlaybackMode>),
    Queue,
    ClearQueue,
    Enqueue(String),
    EnqueueTop(String),
    Dequeue(String),
    Reorder(Vec<String>),
    Arrange(Vec<String>),
    PlaylistNew(String),
    PlaylistAdd(String),
    PlaylistDrop(String),
    PlaylistDelete(String),
    PlaylistRename(String, String),
    Sort(SortOrder),
    Stats(ChartKind),
    Theme(Option<Theme>),
    Status,
    Quit,
}

pub fn parse_command(raw: &str) -> Result<Command> {
    let input = raw.trim();
    if input.is_empty() {
        bail!("No command");
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim();
    let required = |usage: &str| -> Result<String> {
        if rest.is_empty() {
            bail!("Usage: {usage}");
        }
        Ok(rest.to_string())
    };

    let parsed = match command {
        "help" | "?" => Command::Help,
        "list" | "ls" => Command::List,
        "open" => Command::Open(required("open <playlist>")?),
        "tracks" => Command::Tracks,
        "select" => Command::Select(required("select <title>")?),
        "play" => Command::Play((!rest.is_empty()).then(|| rest.to_string())),
        "toggle" | "pause" | "resume" => Command::Toggle,
        "next" => Command::Next,
        "prev" | "previous" => Command::Previous,
        "seek" => match rest.parse::<i32>() {
            Ok(percentage) => Command::Seek(percentage),
            Err(_) => bail!("Usage: seek <0-100>"),
        },
        "stop" => Command::Stop,
        "mode" => Command::Mode(parse_mode(rest)?),
        "queue" => match rest {
            "" => Command::Queue,
            "clear" => Command::ClearQueue,
            _ => bail!("Usage: queue [clear]"),
        },
        "enqueue" => Command::Enqueue(required("enqueue <title>")?),
        "top" => Command::EnqueueTop(required("top <title>")?),
        "dequeue" => Command::Dequeue(required("dequeue <title>")?),
        "reorder" => Command::Reorder(title_list(rest, "reorder <title> | <title> ...")?),
        "arrange" => Command::Arrange(title_list(rest, "arrange <title> | <title> ...")?),
        "playlist" => parse_playlist(rest)?,
        "sort" => match rest {
            "" | "alpha" => Command::Sort(SortOrder::Alphabetical),
            "original" => Command::Sort(SortOrder::Original),
            _ => bail!("Usage: sort <alpha|original>"),
        },
        "stats" => match rest {
            "" | "tracks" => Command::Stats(ChartKind::Tracks),
            "playlists" => Command::Stats(ChartKind::Playlists),
            _ => bail!("Usage: stats [tracks|playlists]"),
        },
        "theme" => match rest {
            "" => Command::Theme(None),
            "dark" | "light" => Command::Theme(Some(Theme::from_token(rest))),
            _ => bail!("Usage: theme [dark|light]"),
        },
        "status" => Command::Status,
        "quit" | "exit" | "q" => Command::Quit,
        _ => bail!("Unknown command. Use help"),
    };
    Ok(parsed)
}

fn parse_mode(raw: &str) -> Result<Option<PlaybackMode>> {
    let mode = match raw {
        "" => None,
        "sequential" | "normal" => Some(PlaybackMode::Sequential),
        "repeat" | "single" => Some(PlaybackMode::Repeat),
        "random" | "shuffle" | "weighted" => Some(PlaybackMode::WeightedRandom),
        _ => bail!("Usage: mode [sequential|repeat|random]"),
    };
    Ok(mode)
}

fn title_list(rest: &str, usage: &str) -> Result<Vec<String>> {
    let titles: Vec<String> = rest
        .split('|')
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .collect();
    if titles.is_empty() {
        bail!("Usage: {usage}");
    }
    Ok(titles)
}

fn parse_playlist(rest: &str) -> Result<Command> {
    let mut playlist_split = rest.splitn(2, char::is_whitespace);
    let action = playlist_split.next().unwrap_or_default();
    let name = playlist_split.next().unwrap_or("").trim().to_string();
    if action.is_empty() || name.is_empty() {
        bail!("Usage: playlist <new|add|drop|delete|rename> <name>");
    }

    let command = match action {
        "new" => Command::PlaylistNew(name),
        "add" => Command::PlaylistAdd(name),
        "drop" => Command::PlaylistDrop(name),
        "delete" => Command::PlaylistDelete(name),
        "rename" => match name.split_once('|') {
            Some((old, new)) if !old.trim().is_empty() && !new.trim().is_empty() => {
                Command::PlaylistRename(old.trim().to_string(), new.trim().to_string())
            }
            _ => bail!("Usage: playlist rename <old> | <new>"),
        },
        _ => bail!("Usage: playlist <new|add|drop|delete|rename> <name>"),
    };
    Ok(command)
}

pub enum Outcome {
    Continue(String),
    Quit,
}

#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub music_root: PathBuf,
    pub paths: ConfigPaths,
    pub controller: ControllerOptions,
}

pub struct Shell {
    controller: Arc<PlaybackController>,
    view: Arc<HeadlessView>,
    paths: ConfigPaths,
    all_tracks: Arc<Playlist>,
    playlists: Vec<Playlist>,
    theme: Theme,
}

impl Shell {
    pub fn new(
        options: ShellOptions,
        opener: Arc<dyn TrackOpener>,
        backend: Arc<dyn DecodeBackend>,
    ) -> Result<Self> {
        let all_tracks = Arc::new(library::all_tracks_playlist(&options.music_root));
        let playlists = library::load_playlists(&options.paths.playlists_dir());
        let view = Arc::new(HeadlessView::new());
        view.set_displayed(Some(Arc::clone(&all_tracks)));

        let controller = PlaybackController::new(
            view.clone(),
            opener,
            backend,
            options.paths.clone(),
            options.controller,
        )?;
        let theme = config::load_theme(&options.paths.theme_file());

        Ok(Self {
            controller,
            view,
            paths: options.paths,
            all_tracks,
            playlists,
            theme,
        })
    }

    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    pub fn view(&self) -> &HeadlessView {
        &self.view
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn banner(&self) -> String {
        format!(
            "sonora: {} tracks, {} playlists, mode {}, theme {}. Type help for commands.",
            self.all_tracks.len(),
            self.playlists.len(),
            self.controller.mode().label(),
            self.theme.token()
        )
    }

    pub fn run(&mut self, input: impl BufRead, mut output: impl Write) -> Result<()> {
        writeln!(output, "{}", self.banner())?;
        for line in input.lines() {
            let line = line.context("failed to read command")?;
            if line.trim().is_empty() {
                continue;
            }
            let reply = match parse_command(&line) {
                Ok(command) => match self.execute(command) {
                    Outcome::Continue(reply) => reply,
                    Outcome::Quit => break,
                },
                Err(err) => err.to_string(),
            };
            if !reply.is_empty() {
                writeln!(output, "{reply}")?;
            }
            output.flush()?;
        }
        self.controller.stop();
        Ok(())
    }

    pub fn execute(&mut self, command: Command) -> Outcome {
        let reply = match command {
            Command::Help => HELP.to_string(),
            Command::List => self.list_playlists(),
            Command::Open(name) => self.open_playlist(&name),
            Command::Tracks => self.list_tracks(),
            Command::Select(title) => self.select(&title),
            Command::Play(title) => {
                match title.or_else(|| self.view.selected_title()) {
                    Some(title) => self.controller.play_selected(&title),
                    None => self.controller.toggle_play_pause(),
                }
                self.status_line()
            }
            Command::Toggle => {
                self.controller.toggle_play_pause();
                self.status_line()
            }
            Command::Next => {
                self.controller.advance();
                self.status_line()
            }
            Command::Previous => {
                self.controller.previous();
                self.status_line()
            }
            Command::Seek(percentage) => {
                self.controller.seek(percentage);
                self.status_line()
            }
            Command::Stop => {
                self.controller.stop();
                self.status_line()
            }
            Command::Mode(None) => {
                format!("mode: {}", self.controller.cycle_mode().label())
            }
            Command::Mode(Some(mode)) => {
                self.controller.set_mode(mode);
                format!("mode: {}", mode.label())
            }
            Command::Queue => self.describe_queue(),
            Command::ClearQueue => {
                self.controller.clear_queue();
                String::from("queue cleared")
            }
            Command::Enqueue(title) => self.enqueue(&title, false),
            Command::EnqueueTop(title) => self.enqueue(&title, true),
            Command::Dequeue(title) => {
                if self.controller.remove_from_queue(&title) {
                    format!("removed {title} from the queue")
                } else {
                    format!("{title} is not queued")
                }
            }
            Command::Reorder(order) => match self.resolve_titles(&order) {
                Ok(order) => {
                    self.controller.replace_queue(order);
                    self.describe_queue()
                }
                Err(reply) => reply,
            },
            Command::Arrange(order) => self.arrange_displayed(&order),
            Command::PlaylistNew(name) => self.create_playlist(&name),
            Command::PlaylistAdd(name) => self.add_selected_to_playlist(&name),
            Command::PlaylistDrop(name) => self.drop_selected_from_playlist(&name),
            Command::PlaylistDelete(name) => self.delete_playlist(&name),
            Command::PlaylistRename(old, new) => self.rename_playlist(&old, &new),
            Command::Sort(order) => self.sort_displayed(order),
            Command::Stats(kind) => {
                let rows = match kind {
                    ChartKind::Tracks => self.controller.top_tracks(DEFAULT_CHART_LEN),
                    ChartKind::Playlists => self.controller.top_playlists(DEFAULT_CHART_LEN),
                };
                stats::render_chart(kind, &rows).trim_end().to_string()
            }
            Command::Theme(theme) => {
                let theme = theme.unwrap_or_else(|| self.theme.toggle());
                self.set_theme(theme)
            }
            Command::Status => self.status_line(),
            Command::Quit => return Outcome::Quit,
        };
        Outcome::Continue(reply)
    }

    fn status_line(&self) -> String {
        let status = self.controller.status();
        let title = self.controller.now_playing();
        format!(
            "{} {} ({}%) mode: {}",
            status.label(),
            title.as_deref().unwrap_or("-"),
            self.controller.progress(),
            self.controller.mode().label()
        )
    }

    fn displayed(&self) -> Arc<Playlist> {
        self.view
            .displayed_playlist()
            .unwrap_or_else(|| Arc::clone(&self.all_tracks))
    }

    fn list_playlists(&self) -> String {
        let shown = self.displayed().name.clone();
        std::iter::once(self.all_tracks.as_ref())
            .chain(self.playlists.iter())
            .map(|playlist| {
                let marker = if playlist.name == shown { '*' } else { ' ' };
                format!(
                    "{marker} {} ({} tracks, {} plays)",
                    playlist.name,
                    playlist.len(),
                    self.controller.playlist_play_count(&playlist.name)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn open_playlist(&mut self, name: &str) -> String {
        let playlist = if name.eq_ignore_ascii_case(ALL_TRACKS_PLAYLIST) {
            Arc::clone(&self.all_tracks)
        } else {
            match self.playlist_index(name) {
                Some(index) => Arc::new(self.playlists[index].clone()),
                None => return format!("no playlist named {name}"),
            }
        };
        let reply = format!("showing {} ({} tracks)", playlist.name, playlist.len());
        self.view.set_displayed(Some(playlist));
        reply
    }

    fn list_tracks(&self) -> String {
        let playlist = self.displayed();
        if playlist.is_empty() {
            return format!("{} is empty", playlist.name);
        }
        let now_playing = self.controller.now_playing();
        let selected = self.view.selected_title();
        let queue = self.controller.queue_snapshot();

        playlist
            .tracks
            .iter()
            .map(|track| {
                let marker = if now_playing.as_deref() == Some(track.title.as_str()) {
                    '▶'
                } else if selected.as_deref() == Some(track.title.as_str()) {
                    '>'
                } else {
                    ' '
                };
                let mut line = format!("{marker} {}", track.title);
                if let Some(author) = &track.author {
                    line.push_str(&format!(" - {author}"));
                }
                if let Some(position) = queue.iter().position(|queued| queued == &track.title) {
                    line.push_str(&format!(" [queued #{}]", position + 1));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn select(&self, title: &str) -> String {
        match self.displayed().track(title) {
            Some(track) => {
                self.view.select_title(&track.title);
                format!("selected {}", track.title)
            }
            None => format!("no track titled {title} here"),
        }
    }

    fn enqueue(&self, title: &str, top: bool) -> String {
        let Some(track) = self.displayed().track(title).cloned() else {
            return format!("no track titled {title} here");
        };
        let added = if top {
            self.controller.enqueue_top(&track.title)
        } else {
            self.controller.enqueue(&track.title)
        };
        if added {
            format!("queued {}", track.title)
        } else {
            format!("{} is already queued", track.title)
        }
    }

    /// Maps typed titles onto the displayed playlist's own spelling.
    fn resolve_titles(&self, titles: &[String]) -> std::result::Result<Vec<String>, String> {
        let playlist = self.displayed();
        titles
            .iter()
            .map(|title| match playlist.track(title) {
                Some(track) => Ok(track.title.clone()),
                None => Err(format!("no track titled {title} here")),
            })
            .collect()
    }

    fn describe_queue(&self) -> String {
        let queue = self.controller.queue_snapshot();
        if queue.is_empty() {
            return String::from("queue is empty");
        }
        queue
            .iter()
            .enumerate()
            .map(|(index, title)| format!("{:2}. {title}", index + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn playlist_index(&self, name: &str) -> Option<usize> {
        self.playlists
            .iter()
            .position(|playlist| playlist.name.eq_ignore_ascii_case(name.trim()))
    }

    fn create_playlist(&mut self, name: &str) -> String {
        if name.eq_ignore_ascii_case(ALL_TRACKS_PLAYLIST) || self.playlist_index(name).is_some() {
            return format!("playlist {name} already exists");
        }
        let playlist = Playlist::new(name);
        if let Err(err) = library::save_playlist(&self.paths.playlists_dir(), &playlist) {
            return format!("could not save {name}: {err:#}");
        }
        self.playlists.push(playlist);
        self.playlists
            .sort_by_cached_key(|playlist| playlist.name.to_lowercase());
        format!("created {name}")
    }

    fn add_selected_to_playlist(&mut self, name: &str) -> String {
        let Some(title) = self.view.selected_title() else {
            return String::from("select a track first");
        };
        let Some(track) = self.displayed().track(&title).cloned() else {
            return format!("no track titled {title} here");
        };
        let Some(index) = self.playlist_index(name) else {
            return format!("no playlist named {name}");
        };
        if !self.playlists[index].add_track(track) {
            return format!("{title} is already in {name}");
        }
        self.store(index, format!("added {title} to {name}"))
    }

    /// Removes the selected title from a saved playlist and from the queue.
    fn drop_selected_from_playlist(&mut self, name: &str) -> String {
        let Some(title) = self.view.selected_title() else {
            return String::from("select a track first");
        };
        let Some(index) = self.playlist_index(name) else {
            return format!("no playlist named {name}");
        };
        let controller = Arc::clone(&self.controller);
        let _hold = controller.suppress_auto_advance();
        if !self.playlists[index].remove_track(&title) {
            return format!("{title} is not in {name}");
        }
        self.controller.remove_from_queue(&title);
        self.store(index, format!("removed {title} from {name}"))
    }

    fn delete_playlist(&mut self, name: &str) -> String {
        let Some(index) = self.playlist_index(name) else {
            return format!("no playlist named {name}");
        };
        let controller = Arc::clone(&self.controller);
        let _hold = controller.suppress_auto_advance();
        let name = self.playlists[index].name.clone();
        if let Err(err) = library::delete_playlist(&self.paths.playlists_dir(), &name) {
            return format!("could not delete {name}: {err:#}");
        }
        let removed = self.playlists.remove(index);
        if self.displayed().name == removed.name {
            self.view.set_displayed(Some(Arc::clone(&self.all_tracks)));
        }
        format!("deleted {}", removed.name)
    }

    fn rename_playlist(&mut self, old: &str, new: &str) -> String {
        let Some(index) = self.playlist_index(old) else {
            return format!("no playlist named {old}");
        };
        if new.eq_ignore_ascii_case(ALL_TRACKS_PLAYLIST)
            || self.playlist_index(new).is_some_and(|other| other != index)
        {
            return format!("playlist {new} already exists");
        }
        let controller = Arc::clone(&self.controller);
        let _hold = controller.suppress_auto_advance();
        let renamed = match library::rename_playlist(
            &self.paths.playlists_dir(),
            &self.playlists[index],
            new,
        ) {
            Ok(renamed) => renamed,
            Err(err) => return format!("could not rename {old}: {err:#}"),
        };

        let previous = std::mem::replace(&mut self.playlists[index], renamed.clone());
        if self.displayed().name == previous.name {
            self.redisplay(Arc::new(renamed.clone()));
        }
        self.playlists
            .sort_by_cached_key(|playlist| playlist.name.to_lowercase());
        format!("renamed {} to {}", previous.name, renamed.name)
    }

    fn sort_displayed(&mut self, order: SortOrder) -> String {
        self.rearrange_displayed("sorted", |playlist| match order {
            SortOrder::Alphabetical => playlist.sort_alphabetically(),
            SortOrder::Original => playlist.restore_original_order(),
        })
    }

    fn arrange_displayed(&mut self, titles: &[String]) -> String {
        match self.resolve_titles(titles) {
            Ok(order) => self.rearrange_displayed("arranged", |playlist| {
                playlist.set_custom_order(&order)
            }),
            Err(reply) => reply,
        }
    }

    /// Applies `edit` to the displayed playlist and saves it when it is a
    /// stored one.
    fn rearrange_displayed(&mut self, verb: &str, edit: impl FnOnce(&mut Playlist)) -> String {
        let controller = Arc::clone(&self.controller);
        let _hold = controller.suppress_auto_advance();
        let mut playlist = (*self.displayed()).clone();
        edit(&mut playlist);
        let reply = format!("{verb} {}", playlist.name);

        if playlist.name == self.all_tracks.name {
            self.all_tracks = Arc::new(playlist);
            self.redisplay(Arc::clone(&self.all_tracks));
            return reply;
        }
        match self.playlist_index(&playlist.name) {
            Some(index) => {
                self.playlists[index] = playlist;
                self.store(index, reply)
            }
            None => reply,
        }
    }

    /// Persists one saved playlist and refreshes the view when it is shown.
    fn store(&mut self, index: usize, reply: String) -> String {
        let playlist = &self.playlists[index];
        if let Err(err) = library::save_playlist(&self.paths.playlists_dir(), playlist) {
            return format!("could not save {}: {err:#}", playlist.name);
        }
        if self.displayed().name == playlist.name {
            self.redisplay(Arc::new(playlist.clone()));
        }
        reply
    }

    fn redisplay(&self, playlist: Arc<Playlist>) {
        let selected = self.view.selected_title();
        let keep = selected.filter(|title| playlist.contains_title(title));
        self.view.set_displayed(Some(playlist));
        if let Some(title) = keep {
            self.view.select_title(&title);
        }
    }

    fn set_theme(&mut self, theme: Theme) -> String {
        self.theme = theme;
        if let Err(err) = config::save_theme(&self.paths.theme_file(), theme) {
            tracing::warn!("failed to save theme: {err:#}");
        }
        format!("theme: {}", theme.token())
    }
}
