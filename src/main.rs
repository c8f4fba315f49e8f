pub mod ui;

use abc_tutor::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    history::HistoryLog,
    messages,
    reading::{Reading, ReadingController, DEFAULT_READING},
    runtime::{CrosstermEventSource, FixedTicker, Runner, TutorEvent},
    session::{SessionController, TutorContext},
    speech::{CommandRecognizer, CommandSpeaker, SilentSpeaker, SpeechRecognizer, TextToSpeech},
    stats::UserProfile,
    store::{JsonProfileStore, ProfileCollection, ProfileStore},
    writer::ProfileWriter,
    Category, TutorError,
};
use chrono::Utc;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use time_humanize::HumanTime;

use crate::ui::{screen::current_screen, QuizView};

const TICK_RATE_MS: u64 = 100;

/// alphabet and digit tutor for young readers
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal tutor that speaks a letter or digit and lets a child pick it among four, steering practice toward the symbols they find hardest. Includes a word-by-word reading mode."
)]
pub struct Cli {
    /// profile to practice with (defaults to the last one used)
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// which symbols to practice
    #[clap(short = 'c', long, value_enum, default_value_t = Category::Letters)]
    category: Category,

    /// read a bundled text word by word instead of the quiz
    #[clap(long, value_name = "NAME", num_args = 0..=1, default_missing_value = DEFAULT_READING)]
    reading: Option<String>,

    /// create the profile given with --user
    #[clap(long)]
    new_user: bool,

    /// list profiles and exit
    #[clap(long)]
    list: bool,

    /// print per-symbol statistics for the profile and exit
    #[clap(long)]
    stats: bool,

    /// move an unreadable profile file aside and start empty
    #[clap(long)]
    reset_corrupt: bool,

    /// profile file to use instead of the default location
    #[clap(long, value_name = "PATH")]
    profiles: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Practice,
    Stats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortBy {
    Symbol,
    SuccessRate,
    Attempts,
}

#[derive(Debug)]
pub struct StatsTableState {
    pub scroll_offset: usize,
    pub sort_by: SortBy,
    pub sort_ascending: bool,
}

impl Default for StatsTableState {
    fn default() -> Self {
        Self {
            scroll_offset: 0,
            sort_by: SortBy::Symbol,
            sort_ascending: true,
        }
    }
}

pub enum Activity<'a> {
    Quiz(SessionController<'a, QuizView>),
    Reading(ReadingController<'a>),
}

pub struct App<'a> {
    pub activity: Activity<'a>,
    pub state: AppState,
    pub stats_state: StatsTableState,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

impl<'a> App<'a> {
    pub fn new(activity: Activity<'a>) -> Self {
        Self {
            activity,
            state: AppState::Practice,
            stats_state: StatsTableState::default(),
        }
    }

    /// Profile and category behind the stats screen; none while reading
    pub fn stats_source(&self) -> Option<(&UserProfile, Category)> {
        match &self.activity {
            Activity::Quiz(session) => session.profile().ok().map(|p| (p, session.category())),
            Activity::Reading(_) => None,
        }
    }

    fn on_tick(&mut self, now: Instant) -> abc_tutor::Result<()> {
        match &mut self.activity {
            Activity::Quiz(session) => {
                session.poll(now)?;
            }
            Activity::Reading(reading) => {
                reading.poll(now);
            }
        }
        Ok(())
    }

    fn on_key(&mut self, key: KeyEvent) -> abc_tutor::Result<Flow> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(Flow::Quit);
        }

        match self.state {
            AppState::Stats => self.on_stats_key(key),
            AppState::Practice => match &mut self.activity {
                _ if key.code == KeyCode::Esc => return Ok(Flow::Quit),
                Activity::Quiz(session) => match key.code {
                    KeyCode::Tab => self.state = AppState::Stats,
                    KeyCode::Left => session.presenter_mut().select_previous(),
                    KeyCode::Right => session.presenter_mut().select_next(),
                    KeyCode::Up => session.repeat_prompt(),
                    KeyCode::Enter => {
                        let selected = session.presenter().selected;
                        session.submit_answer(selected)?;
                    }
                    KeyCode::Char(' ') => match session.start_listening() {
                        Ok(()) => {}
                        Err(TutorError::NoRecognizer) => session
                            .presenter_mut()
                            .set_status("Pas de micro configuré, choisis avec le clavier."),
                        Err(TutorError::AlreadyListening) => {
                            session.presenter_mut().set_status(messages::LISTENING)
                        }
                        Err(e) => return Err(e),
                    },
                    KeyCode::Char(c) if session.category().contains(c.to_ascii_uppercase()) => {
                        session.submit_symbol(c)?;
                    }
                    _ => {}
                },
                Activity::Reading(reading) => match key.code {
                    KeyCode::Enter => reading.confirm_word(),
                    KeyCode::Up => reading.repeat_word(),
                    KeyCode::Char(' ') => match reading.start_listening() {
                        Ok(()) | Err(TutorError::NoRecognizer) | Err(TutorError::AlreadyListening) => {}
                        Err(e) => return Err(e),
                    },
                    _ => {}
                },
            },
        }
        Ok(Flow::Continue)
    }

    fn on_stats_key(&mut self, key: KeyEvent) {
        let stats = &mut self.stats_state;
        match key.code {
            KeyCode::Tab | KeyCode::Esc | KeyCode::Backspace => self.state = AppState::Practice,
            KeyCode::Up => stats.scroll_offset = stats.scroll_offset.saturating_sub(1),
            // clamped when rendered
            KeyCode::Down => stats.scroll_offset += 1,
            KeyCode::Home => stats.scroll_offset = 0,
            KeyCode::Char(' ') => {
                stats.sort_ascending = !stats.sort_ascending;
                stats.scroll_offset = 0;
            }
            KeyCode::Char(c @ '1'..='3') => {
                stats.sort_by = match c {
                    '1' => SortBy::Symbol,
                    '2' => SortBy::SuccessRate,
                    _ => SortBy::Attempts,
                };
                stats.scroll_offset = 0;
            }
            _ => {}
        }
    }
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    // the terminal belongs to the TUI, so logs go to a file
    if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
        let env = env_logger::Env::new().filter_or("ABC_TUTOR_LOG", "info");
        let _ = env_logger::Builder::from_env(env)
            .target(env_logger::Target::Pipe(Box::new(file)))
            .try_init();
    }
}

fn load_profiles(store: &JsonProfileStore, reset_corrupt: bool) -> abc_tutor::Result<ProfileCollection> {
    if reset_corrupt {
        store.load_or_reset()
    } else {
        store.load()
    }
}

fn print_profiles(profiles: &ProfileCollection) {
    if profiles.is_empty() {
        println!("no profiles yet; create one with --user NAME --new-user");
        return;
    }
    let now = Utc::now();
    for profile in profiles.iter() {
        let letters = profile.progress(Category::Letters);
        let digits = profile.progress(Category::Digits);
        let last_played = profile
            .last_played_at
            .map(|at| HumanTime::from_seconds(-(now - at).num_seconds()).to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<16} letters {:>2}/{}  digits {:>2}/{}  last played {}",
            profile.name,
            letters.mastered,
            letters.total,
            digits.mastered,
            digits.total,
            last_played
        );
    }
}

fn print_stats(profile: &UserProfile, category: Category, history: Option<&HistoryLog>) {
    let (correct, attempts) = profile.totals(category);
    let progress = profile.progress(category);
    println!(
        "{} / {category}: {correct}/{attempts} correct, {}/{} mastered",
        profile.name, progress.mastered, progress.total
    );
    for (symbol, stat) in profile.stats(category) {
        let rate = stat
            .success_rate()
            .map(|r| format!("{:>3.0}%", r * 100.0))
            .unwrap_or_else(|| "   -".to_string());
        let mastered = if stat.is_mastered() { "mastered" } else { "" };
        println!(
            "  {symbol}  {:>3}/{:<3} {rate}  {mastered}",
            stat.correct, stat.attempts
        );
    }

    let recent = history
        .and_then(|h| h.for_user(&profile.name).ok())
        .unwrap_or_default();
    if !recent.is_empty() {
        println!("recent sessions:");
        for record in recent.iter().take(5) {
            println!(
                "  {}  {:<7} {}/{}",
                record.date.format("%Y-%m-%d %H:%M"),
                record.category,
                record.correct,
                record.answered
            );
        }
    }
}

fn resolve_user(cli: &Cli, config: &Config) -> Result<String, Box<dyn Error>> {
    match cli.user.clone().or_else(|| config.last_user.clone()) {
        Some(user) if user.trim().is_empty() => Err(TutorError::InvalidProfileName(user).into()),
        Some(user) => Ok(user),
        None => Err("no profile selected: pass --user NAME (add --new-user to create it)".into()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = run(cli) {
        log::error!("{e}");
        eprintln!("abc-tutor: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config_store = FileConfigStore::new();
    let mut config = config_store.load();

    let store = match cli.profiles.clone().or_else(|| config.profiles_path.clone()) {
        Some(path) => JsonProfileStore::with_path(path),
        None => JsonProfileStore::new(),
    };
    let profiles = load_profiles(&store, cli.reset_corrupt)?;

    if cli.list {
        print_profiles(&profiles);
        return Ok(());
    }

    let history = HistoryLog::new();
    let reading = cli.reading.as_deref().map(Reading::bundled).transpose()?;
    let user = match reading {
        Some(_) => None,
        None => Some(resolve_user(&cli, &config)?),
    };

    if let (Some(user), true) = (&user, cli.stats) {
        print_stats(profiles.get_profile(user)?, cli.category, history.as_ref());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let speaker: Box<dyn TextToSpeech> = match config.speech_command.clone() {
        Some(spec) => Box::new(CommandSpeaker::new(spec)),
        None => {
            log::info!("no speech command configured; running silently");
            Box::new(SilentSpeaker)
        }
    };
    let mut ctx = TutorContext::new(
        config.clone(),
        profiles,
        ProfileWriter::spawn(store),
        speaker,
    );
    if let Some(spec) = config.recognizer_command.clone() {
        let recognizer: Arc<dyn SpeechRecognizer> = Arc::new(CommandRecognizer::new(spec));
        ctx = ctx.with_recognizer(recognizer);
    }
    if let Some(history) = history {
        ctx = ctx.with_history(history);
    }

    if let Some(user) = &user {
        if cli.new_user && !ctx.create_profile(user) {
            log::info!("profile {user:?} already exists");
        }
        ctx.profiles.get_profile(user)?;
        config.last_user = Some(user.clone());
        if let Err(e) = config_store.save(&config) {
            log::warn!("could not save config: {e}");
        }
    }

    let can_listen = ctx.recognizer.is_some();
    let activity = match (reading, &user) {
        (Some(reading), _) => Activity::Reading(ReadingController::new(&ctx, reading)),
        (None, Some(user)) => {
            let mut session =
                SessionController::new(&mut ctx, user, cli.category, QuizView::new(can_listen))?;
            session.start()?;
            session.presenter_mut().set_status(messages::welcome(user));
            Activity::Quiz(session)
        }
        (None, None) => return Err("no profile selected".into()),
    };
    let mut app = App::new(activity);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    let summary = match app.activity {
        Activity::Quiz(session) => Some(session.finish()),
        Activity::Reading(reading) => {
            reading.finish();
            None
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result?;
    if let Some(summary) = summary.transpose()? {
        println!("{}", messages::farewell(summary.correct));
    }

    Ok(())
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| ui(app, f))?;
    loop {
        match runner.step() {
            TutorEvent::Tick => app.on_tick(Instant::now())?,
            TutorEvent::Resize => {}
            TutorEvent::Key(key) => {
                if app.on_key(key)? == Flow::Quit {
                    break;
                }
            }
        }
        terminal.draw(|f| ui(app, f))?;
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    current_screen(&app.state).render(app, f);
}
