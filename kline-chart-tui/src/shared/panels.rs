//! Screen layout and the panels around the chart.
//!
//! Order book, trades and order entry are placeholders derived from the last
//! price; nothing here talks to an exchange.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::shared::chart::{CandleChartWidget, C_DOWN, C_UP};
use crate::shared::state::ViewState;
use crate::shared::types::Interval;

const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);
const C_WARN: Color = Color::Rgb(240, 180, 60);

pub const MOCK_BADGE: &str = "MOCK DATA (REST unreachable)";

const FUNDING_RATE: &str = "0.0009%";
const FUNDING_COUNTDOWN: &str = "01:25:07";
const LEVERAGE_OPTIONS: [u8; 4] = [1, 5, 10, 20];
const DEFAULT_LEVERAGE: u8 = 10;

/// (price multiplier, size)
const ASKS: [(f64, f64); 2] = [(1.002, 8.3), (1.001, 12.5)];
const BIDS: [(f64, f64); 2] = [(0.999, 15.2), (0.998, 9.7)];
/// (price multiplier, size, is_buy)
const TRADES: [(f64, f64, bool); 3] = [(1.0, 2.5, true), (0.999, 1.8, false), (1.001, 3.2, true)];

/// Draw the whole screen. Records the chart's inner width on the way.
pub fn render_view(f: &mut Frame, state: &mut ViewState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, rows[0], state);
    render_timeframes(f, rows[1], state.interval);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(30)])
        .split(rows[2]);

    render_chart(f, main[0], state);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Length(5), Constraint::Min(7)])
        .split(main[1]);

    let price = state.last_price();
    render_order_book(f, side[0], price);
    render_trades(f, side[1], price);
    render_order_entry(f, side[2]);
    render_footer(f, rows[3]);
}

fn change_color(change: f64) -> Color {
    if change >= 0.0 {
        C_UP
    } else {
        C_DOWN
    }
}

pub fn render_header(f: &mut Frame, area: Rect, state: &ViewState) {
    let block = Block::default()
        .title(format!(" {} PERPETUAL ", state.symbol))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));

    let price = state.last_price();
    let change = state.price_change();
    let color = change_color(change);
    let arrow = if change >= 0.0 { "▲" } else { "▼" };

    let (dot, status_text, status_color) = if state.status.is_connected() {
        ("●", "Connected", C_UP)
    } else {
        ("○", "Disconnected", C_DOWN)
    };

    let first = Line::from(vec![
        Span::styled(format!("{:.2} ", price), Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!("{}{:+.2} ({:+.2}%)", arrow, change, state.change_percent()),
            Style::default().fg(color),
        ),
        Span::styled("   Mark ", Style::default().fg(C_DIM)),
        Span::styled(format!("{:.2}", price * 0.9999), Style::default().fg(C_BRIGHT)),
        Span::styled("   Funding ", Style::default().fg(C_DIM)),
        Span::styled(FUNDING_RATE, Style::default().fg(C_WARN)),
        Span::styled(format!(" {}", FUNDING_COUNTDOWN), Style::default().fg(C_BRIGHT)),
        Span::styled(format!("   {} {}", dot, status_text), Style::default().fg(status_color)),
    ]);

    let mut band_spans = vec![Span::styled(
        format!("BB({}, {:.1})", state.bands.period, state.bands.multiplier),
        Style::default().fg(C_ACCENT),
    )];
    match state.current_band() {
        Some(band) => {
            band_spans.push(Span::styled(
                format!("  U {:.2}  M {:.2}  L {:.2}", band.upper, band.mid, band.lower),
                Style::default().fg(C_BRIGHT),
            ));
            if let Some(pct_b) = band.percent_b(price) {
                band_spans.push(Span::styled(format!("  %B {:.2}", pct_b), Style::default().fg(C_DIM)));
            }
        }
        None => band_spans.push(Span::styled("  --", Style::default().fg(C_DIM))),
    }

    f.render_widget(Paragraph::new(vec![first, Line::from(band_spans)]).block(block), area);
}

pub fn render_timeframes(f: &mut Frame, area: Rect, current: Interval) {
    let mut spans = vec![Span::styled(" ", Style::default())];
    for (idx, interval) in Interval::SELECTOR.iter().enumerate() {
        let style = if *interval == current {
            Style::default().fg(Color::Black).bg(C_ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(C_DIM)
        };
        spans.push(Span::styled(format!(" {}:{} ", idx + 1, interval), style));
        spans.push(Span::raw(" "));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chart(f: &mut Frame, area: Rect, state: &mut ViewState) {
    let title = format!(
        " {} · {} · BB({}, {:.1}) ",
        state.symbol, state.interval, state.bands.period, state.bands.multiplier
    );
    let mut block = Block::default()
        .title_top(Line::from(title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));

    if state.show_mock_badge() {
        block = block.title_top(
            Line::from(Span::styled(
                format!(" {} ", MOCK_BADGE),
                Style::default().fg(Color::Black).bg(C_WARN).add_modifier(Modifier::BOLD),
            ))
            .right_aligned(),
        );
    } else if let Some(source) = &state.source {
        block = block.title_top(
            Line::from(Span::styled(format!(" {} ", source.label()), Style::default().fg(C_DIM)))
                .right_aligned(),
        );
    }

    state.chart.resize(block.inner(area).width);
    f.render_widget(CandleChartWidget::new(&state.chart).block(block), area);
}

pub fn render_order_book(f: &mut Frame, area: Rect, price: f64) {
    let block = Block::default()
        .title(" ORDER BOOK ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));

    let level = |mult: f64, size: f64, color: Color| {
        Line::from(vec![
            Span::styled(format!("{:>12.2}", price * mult), Style::default().fg(color)),
            Span::styled(format!("{:>10.1}", size), Style::default().fg(C_BRIGHT)),
        ])
    };

    let mut lines: Vec<Line> = ASKS.iter().map(|(m, s)| level(*m, *s, C_DOWN)).collect();
    lines.push(Line::from(Span::styled(
        format!("{:>12.2}", price),
        Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
    )));
    lines.extend(BIDS.iter().map(|(m, s)| level(*m, *s, C_UP)));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_trades(f: &mut Frame, area: Rect, price: f64) {
    let block = Block::default()
        .title(" TRADES ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));

    let lines: Vec<Line> = TRADES
        .iter()
        .map(|(mult, size, is_buy)| {
            let color = if *is_buy { C_UP } else { C_DOWN };
            Line::from(vec![
                Span::styled(format!("{:>12.2}", price * mult), Style::default().fg(color)),
                Span::styled(format!("{:>10.1}", size), Style::default().fg(C_BRIGHT)),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_order_entry(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" ORDER ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));

    let mut leverage = vec![Span::styled("Lev ", Style::default().fg(C_DIM))];
    for option in LEVERAGE_OPTIONS {
        let style = if option == DEFAULT_LEVERAGE {
            Style::default().fg(Color::Black).bg(C_ACCENT)
        } else {
            Style::default().fg(C_DIM)
        };
        leverage.push(Span::styled(format!("{}x", option), style));
        leverage.push(Span::raw(" "));
    }

    let lines = vec![
        Line::from(leverage),
        Line::from(vec![
            Span::styled("Qty   ", Style::default().fg(C_DIM)),
            Span::styled("0.00", Style::default().fg(C_BRIGHT)),
        ]),
        Line::from(vec![
            Span::styled("Price ", Style::default().fg(C_DIM)),
            Span::styled("Market", Style::default().fg(C_BRIGHT)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Buy/Long ", Style::default().fg(Color::Black).bg(C_UP).add_modifier(Modifier::BOLD)),
            Span::raw(" "),
            Span::styled(" Sell/Short ", Style::default().fg(Color::Black).bg(C_DOWN).add_modifier(Modifier::BOLD)),
        ]),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let footer = Line::from(Span::styled(
        " q/Esc quit · 1-8 timeframe · [ ] BB period · - = BB mult ",
        Style::default().fg(C_DIM),
    ));
    f.render_widget(Paragraph::new(footer).alignment(Alignment::Left), area);
}
