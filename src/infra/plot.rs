// ============================================================
// Layer 6 — Loss Chart
// ============================================================
// Draws train and validation loss per epoch as two lines in
// the terminal (braille characters via textplots). The chart
// goes to stdout only; the numbers themselves are in
// metrics.csv.
//
// Reference: Burn train dashboard (TextPlot)

use textplots::{Chart, Plot, Shape};

use crate::ml::trainer::TrainingHistory;

const WIDTH:  u32 = 120;
const HEIGHT: u32 = 40;

/// (epoch, train) and (epoch, val) point series
pub fn loss_series(history: &TrainingHistory) -> (Vec<(f32, f32)>, Vec<(f32, f32)>) {
    history
        .epochs()
        .iter()
        .map(|e| {
            let x = e.epoch as f32;
            ((x, e.train_loss as f32), (x, e.val_loss as f32))
        })
        .unzip()
}

/// Rendered chart, or None when there is nothing to draw
pub fn render_loss_chart(history: &TrainingHistory) -> Option<String> {
    let (train, valid) = loss_series(history);
    let first = train.first()?.0;
    let last  = train.last()?.0.max(first + 1.0);

    let chart = Chart::new(WIDTH, HEIGHT, first, last)
        .lineplot(&Shape::Lines(&train))
        .lineplot(&Shape::Lines(&valid))
        .to_string();

    Some(format!("Loss per epoch (first line: train, second: validation)\n{chart}\n"))
}
