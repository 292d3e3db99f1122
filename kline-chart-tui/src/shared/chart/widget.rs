//! Ratatui widget drawing candles, band overlays and a price axis

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Widget},
};

use super::model::{CandleChart, PRICE_AXIS_WIDTH};
use crate::shared::types::Candle;

pub const C_UP: Color = Color::Rgb(38, 166, 154);
pub const C_DOWN: Color = Color::Rgb(239, 83, 80);
const C_BAND: Color = Color::Rgb(167, 139, 250);
const C_BAND_MID: Color = Color::Rgb(148, 163, 184);
const C_AXIS: Color = Color::Rgb(120, 120, 120);

/// Candlestick chart with Bollinger overlays
pub struct CandleChartWidget<'a> {
    chart: &'a CandleChart,
    block: Option<Block<'a>>,
}

impl<'a> CandleChartWidget<'a> {
    pub fn new(chart: &'a CandleChart) -> Self {
        Self { chart, block: None }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

/// Linear price → row mapping over a plot area
struct PriceScale {
    min: f64,
    max: f64,
    top: u16,
    height: u16,
}

impl PriceScale {
    fn new(min: f64, max: f64, top: u16, height: u16) -> Self {
        let (min, max) = if (max - min).abs() < f64::EPSILON {
            (min - 1.0, max + 1.0)
        } else {
            (min, max)
        };
        Self { min, max, top, height }
    }

    fn row(&self, price: f64) -> u16 {
        let span = (self.height.saturating_sub(1)) as f64;
        let frac = ((self.max - price) / (self.max - self.min)).clamp(0.0, 1.0);
        self.top + (frac * span).round() as u16
    }
}

fn put(buf: &mut Buffer, x: u16, y: u16, symbol: &str, color: Color) {
    if let Some(cell) = buf.cell_mut((x, y)) {
        cell.set_symbol(symbol).set_fg(color);
    }
}

impl Widget for CandleChartWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = match self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.render(area, buf);
                inner
            }
            None => area,
        };

        if inner.height < 3 || inner.width <= PRICE_AXIS_WIDTH {
            return;
        }

        let plot_width = (inner.width - PRICE_AXIS_WIDTH) as usize;
        let visible = self.chart.visible_candles();
        let candles: &[Candle] = &visible[visible.len().saturating_sub(plot_width)..];

        if candles.is_empty() {
            let msg = "Waiting for klines...";
            let x = inner.x + inner.width.saturating_sub(msg.len() as u16) / 2;
            buf.set_string(x, inner.y + inner.height / 2, msg, Style::default().fg(C_AXIS));
            return;
        }

        let bands: Vec<_> = candles.iter().map(|c| self.chart.band_at(c.time)).collect();

        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for (candle, band) in candles.iter().zip(&bands) {
            min = min.min(candle.low);
            max = max.max(candle.high);
            if let Some(b) = band {
                min = min.min(b.lower);
                max = max.max(b.upper);
            }
        }
        let scale = PriceScale::new(min, max, inner.y, inner.height);

        for (i, (candle, band)) in candles.iter().zip(&bands).enumerate() {
            let x = inner.x + i as u16;

            if let Some(b) = band {
                put(buf, x, scale.row(b.upper), "·", C_BAND);
                put(buf, x, scale.row(b.mid), "·", C_BAND_MID);
                put(buf, x, scale.row(b.lower), "·", C_BAND);
            }

            let color = if candle.is_up() { C_UP } else { C_DOWN };
            for y in scale.row(candle.high)..=scale.row(candle.low) {
                put(buf, x, y, "│", color);
            }
            let (body_top, body_bottom) = {
                let (a, b) = (scale.row(candle.open), scale.row(candle.close));
                (a.min(b), a.max(b))
            };
            for y in body_top..=body_bottom {
                put(buf, x, y, "█", color);
            }
        }

        // Price axis
        let axis_x = inner.x + plot_width as u16 + 1;
        let label_width = (PRICE_AXIS_WIDTH - 1) as usize;
        let axis_style = Style::default().fg(C_AXIS);
        let bottom = inner.y + inner.height - 1;
        for y in [inner.y, inner.y + inner.height / 2, bottom] {
            let frac = (y - inner.y) as f64 / (inner.height - 1) as f64;
            let price = scale.max - frac * (scale.max - scale.min);
            buf.set_string(axis_x, y, format!("{:>w$.2}", price, w = label_width), axis_style);
        }

        if let Some(last) = candles.last() {
            let color = if last.is_up() { C_UP } else { C_DOWN };
            buf.set_string(
                axis_x,
                scale.row(last.close),
                format!("{:>w$.2}", last.close, w = label_width),
                Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::indicators::{bollinger_bands, Bands};

    fn render(chart: &CandleChart, width: u16, height: u16) -> Buffer {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        CandleChartWidget::new(chart).render(area, &mut buf);
        buf
    }

    fn column(buf: &Buffer, x: u16) -> Vec<String> {
        (0..buf.area.height).map(|y| buf[(x, y)].symbol().to_string()).collect()
    }

    #[test]
    fn test_empty_chart_shows_placeholder() {
        let mut chart = CandleChart::new();
        chart.resize(40);
        let buf = render(&chart, 40, 10);
        let row: String = (0..40).map(|x| buf[(x, 5)].symbol().to_string()).collect();
        assert!(row.contains("Waiting for klines..."));
    }

    #[test]
    fn test_up_and_down_candles() {
        let mut chart = CandleChart::new();
        chart.set_data(
            vec![
                Candle::new(0, 100.0, 110.0, 90.0, 108.0),
                Candle::new(60, 108.0, 109.0, 95.0, 96.0),
            ],
            Bands::default(),
        );
        chart.resize(30);
        let buf = render(&chart, 30, 21);

        // Highest high maps to the top row, lowest low to the bottom row
        assert_eq!(buf[(0, 0)].symbol(), "│");
        assert_eq!(buf[(0, 20)].symbol(), "│");
        assert!(column(&buf, 0).iter().any(|s| s == "█"));
        assert_eq!(buf[(0, 10)].fg, C_UP);
        assert_eq!(buf[(1, 10)].fg, C_DOWN);
    }

    #[test]
    fn test_only_latest_candles_fit() {
        let candles: Vec<Candle> = (0..100)
            .map(|i| Candle::new(i * 60, 100.0, 101.0, 99.0, 100.5))
            .collect();
        let mut chart = CandleChart::new();
        chart.set_data(candles, Bands::default());
        chart.resize(PRICE_AXIS_WIDTH + 20);
        let buf = render(&chart, PRICE_AXIS_WIDTH + 20, 8);

        for x in 0..20 {
            assert!(column(&buf, x).iter().any(|s| s == "│" || s == "█"), "column {}", x);
        }
    }

    #[test]
    fn test_band_overlay_drawn() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let c = 100.0 + (i % 5) as f64 * 3.0;
                Candle::new(i * 60, c, c, c, c)
            })
            .collect();
        let bands = bollinger_bands(&candles, 20, 2.0);
        let mut chart = CandleChart::new();
        chart.set_data(candles, bands);
        chart.resize(PRICE_AXIS_WIDTH + 30);
        let buf = render(&chart, PRICE_AXIS_WIDTH + 30, 20);

        // Band dots only on columns with a full window behind them
        assert!(!column(&buf, 0).iter().any(|s| s == "·"));
        assert!(column(&buf, 29).iter().any(|s| s == "·"));
    }

    #[test]
    fn test_tiny_area_renders_nothing() {
        let mut chart = CandleChart::new();
        chart.set_data(vec![Candle::new(0, 1.0, 2.0, 0.5, 1.5)], Bands::default());
        chart.resize(5);
        let buf = render(&chart, 5, 2);
        assert!((0..5).all(|x| buf[(x, 0)].symbol() == " "));
    }
}
