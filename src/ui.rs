use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use expensasaurus::{
    categories, ChangeDirection, DashboardSummary, ExpenseFilter, Period, PeriodChange,
    Transaction, TransactionKind,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Expenses,
    Categories,
    Compare,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Expenses => Page::Categories,
            Page::Categories => Page::Compare,
            Page::Compare => Page::Expenses,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Expenses => Page::Compare,
            Page::Categories => Page::Expenses,
            Page::Compare => Page::Categories,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Expenses => "Expenses",
            Page::Categories => "Categories",
            Page::Compare => "Compare",
        }
    }
}

pub struct App {
    pub transactions: Vec<Transaction>,
    pub period: Period,
    pub summary: DashboardSummary,
    pub filter: ExpenseFilter,
    pub visible: Vec<Transaction>,
    pub state: TableState,
    pub category_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
}

impl App {
    pub fn new(transactions: Vec<Transaction>, period: Period) -> Self {
        let summary = DashboardSummary::build(&transactions, period);

        let mut category_state = TableState::default();
        category_state.select(Some(0));

        let mut app = Self {
            transactions,
            period,
            summary,
            filter: ExpenseFilter::default(),
            visible: Vec::new(),
            state: TableState::default(),
            category_state,
            current_page: Page::Expenses,
            show_detail: false,
        };
        app.refresh();
        app
    }

    /// Recompute the summary and the visible rows for the current month and filter
    fn refresh(&mut self) {
        self.summary = DashboardSummary::build(&self.transactions, self.period);

        let month = ExpenseFilter {
            from: Some(self.period.start()),
            to: Some(self.period.end() - chrono::Duration::nanoseconds(1)),
            page_size: usize::MAX,
            ..self.filter.clone()
        };
        self.visible = month.apply(&self.transactions).items;

        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn set_period(&mut self, period: Period) {
        self.period = period;
        self.refresh();
    }

    pub fn previous_month(&mut self) {
        self.set_period(self.period.previous());
    }

    pub fn next_month(&mut self) {
        self.set_period(self.period.next());
    }

    /// Show only the category highlighted on the categories page
    pub fn drill_into_selected_category(&mut self) {
        let key = self
            .category_state
            .selected()
            .and_then(|i| self.summary.categories.keys().nth(i))
            .map(str::to_string);

        if let Some(key) = key {
            self.filter.category = Some(key);
            self.current_page = Page::Expenses;
            self.refresh();
        }
    }

    pub fn clear_filter(&mut self) {
        if self.filter.is_empty() {
            return;
        }
        self.filter = ExpenseFilter::default();
        self.refresh();
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_transaction(&self) -> Option<&Transaction> {
        self.state.selected().and_then(|i| self.visible.get(i))
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        match self.current_page {
            Page::Categories => {
                let len = self.summary.categories.len();
                step(&mut self.category_state, len, 1);
            }
            _ => {
                let len = self.visible.len();
                step(&mut self.state, len, 1);
            }
        }
    }

    pub fn previous(&mut self) {
        match self.current_page {
            Page::Categories => {
                let len = self.summary.categories.len();
                step(&mut self.category_state, len, -1);
            }
            _ => {
                let len = self.visible.len();
                step(&mut self.state, len, -1);
            }
        }
    }
}

/// Move a table selection by `delta`, wrapping at both ends
fn step(state: &mut TableState, len: usize, delta: isize) {
    if len == 0 {
        return;
    }
    let i = match state.selected() {
        Some(i) => (i as isize + delta).rem_euclid(len as isize) as usize,
        None => 0,
    };
    state.select(Some(i));
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter if app.current_page == Page::Categories => {
                    app.drill_into_selected_category()
                }
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('[') => app.previous_month(),
                KeyCode::Char(']') => app.next_month(),
                KeyCode::Char('c') => app.clear_filter(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Expenses {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_expenses(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Expenses => render_expenses(f, chunks[1], app),
            Page::Categories => render_categories(f, chunks[1], app),
            Page::Compare => render_compare(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn direction_color(direction: ChangeDirection) -> Color {
    match direction {
        ChangeDirection::Increase => Color::Green,
        ChangeDirection::Decrease => Color::Red,
        ChangeDirection::Unchanged => Color::DarkGray,
    }
}

fn change_span(label: &str, change: &PeriodChange) -> Vec<Span<'static>> {
    let arrow = match change.direction {
        ChangeDirection::Increase => "▲",
        ChangeDirection::Decrease => "▼",
        ChangeDirection::Unchanged => "=",
    };
    vec![
        Span::raw(format!("{} ", label)),
        Span::styled(
            format!("{} {:+.1}%", arrow, change.percentage),
            Style::default().fg(direction_color(change.direction)),
        ),
    ]
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Expenses, Page::Categories, Page::Compare];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let summary = &app.summary;
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("{}", app.period),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Spent {:.2}", summary.expense_total),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.extend(change_span("", &summary.expense_change));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Income {:.2}", summary.income_total),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.extend(change_span("", &summary.income_change));

    let top: Vec<String> = summary
        .top_categories(3)
        .into_iter()
        .map(|(key, category)| format!("{} {:.0}", categories::display_name(key), category.amount))
        .collect();
    if !top.is_empty() {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("Top: {}", top.join(", ")),
            Style::default().fg(Color::Magenta),
        ));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_expenses(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.visible.iter().map(|tx| {
        let color = match tx.kind {
            TransactionKind::Expense => Color::Red,
            TransactionKind::Income => Color::Green,
            TransactionKind::Saving => Color::Cyan,
        };

        Row::new(vec![
            Cell::from(tx.date.format("%Y-%m-%d").to_string()),
            Cell::from(truncate(&tx.title, 30)),
            Cell::from(format!("{:.2}", tx.amount)).style(Style::default().fg(color)),
            Cell::from(tx.currency.clone()),
            Cell::from(categories::display_name(&tx.category)),
            Cell::from(truncate(&tx.tag, 15)),
        ])
        .height(1)
    });

    let title = match &app.filter.category {
        Some(category) => format!(" Expenses - {} ", categories::display_name(category)),
        None => " Expenses ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(18),
            Constraint::Length(17),
        ],
    )
    .header(header_row(&["Date", "Title", "Amount", "Cur", "Category", "Tag"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_categories(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .summary
        .categories
        .iter()
        .map(|(key, summary)| {
            let icon = categories::find(key).map(|c| c.icon).unwrap_or(" ");
            let share = if summary.percentage.is_finite() {
                format!("{:.1}%", summary.percentage)
            } else {
                "-".to_string()
            };
            let style = if summary.transactions_count == 0 {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };

            Row::new(vec![
                Cell::from(format!("{} {}", icon, categories::display_name(key))),
                Cell::from(format!("{:.2}", summary.amount)),
                Cell::from(plural(summary.transactions_count, "transaction")),
                Cell::from(share),
            ])
            .style(style)
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(24),
            Constraint::Length(14),
            Constraint::Length(18),
            Constraint::Length(10),
        ],
    )
    .header(header_row(&["Category", "Amount", "Count", "Share"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Spending by Category - {} ", app.period)),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.category_state);
}

fn render_compare(f: &mut Frame, area: Rect, app: &App) {
    let rows: Vec<Row> = app
        .summary
        .category_changes
        .iter()
        .map(|(key, change)| {
            let pct = if !change.percentage_change.is_finite() {
                "new".to_string()
            } else if change.absolute_prev_value == 0.0 {
                "-".to_string()
            } else {
                format!("{:+.1}%", change.percentage_change)
            };
            // Spending more is bad
            let color = if change.percentage_change > 0.0 {
                Color::Red
            } else if change.percentage_change < 0.0 {
                Color::Green
            } else {
                Color::White
            };

            Row::new(vec![
                Cell::from(categories::display_name(key)),
                Cell::from(format!("{:.2}", change.absolute_prev_value)),
                Cell::from(format!("{:.2}", change.absolute_curr_value)),
                Cell::from(pct).style(Style::default().fg(color)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(10),
        ],
    )
    .header(header_row(&["Category", "Previous", "Current", "Change"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" {} vs {} ", app.period, app.period.previous())),
    );

    f.render_widget(table, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.visible.len()),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(category) = &app.filter.category {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", category),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    for (key, label) in [
        ("Enter", " Details | "),
        ("Tab", " Page | "),
        ("[ ]", " Month | "),
        ("↑/↓", " Nav | "),
    ] {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Expense Details ");

    let tx = match app.selected_transaction() {
        Some(t) => t,
        None => {
            f.render_widget(Paragraph::new("No expense selected").block(block), area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(name, label), Span::raw(value)])
    };

    let content = vec![
        Line::from(""),
        field("  Title: ", tx.title.clone()),
        Line::from(""),
        field("  Date: ", tx.date.format("%Y-%m-%d %H:%M").to_string()),
        Line::from(""),
        field("  Amount: ", format!("{:.2} {}", tx.amount, tx.currency)),
        Line::from(""),
        field("  Category: ", categories::display_name(&tx.category)),
        Line::from(""),
        field("  Kind: ", tx.kind.to_string()),
        Line::from(""),
        field("  Tag: ", tx.tag.clone()),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(vec![Span::raw("  "), Span::styled(
            wrap_text(&tx.description, 35),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )]),
        Line::from(""),
        field("  Id: ", tx.id.clone()),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn wrap_text(text: &str, width: usize) -> String {
    if text.len() <= width {
        return text.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.len() + word.len() + 1 > width {
            lines.push(std::mem::take(&mut current_line));
        }
        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }
    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines.join("\n  ")
}
