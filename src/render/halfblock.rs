use std::io::{self, Write};

use crossterm::{
    cursor, queue,
    style::{Print, SetBackgroundColor, SetForegroundColor},
};

use super::{make_color, HalfblockCell, HALF_BLOCK};

/// Fast path for 1x supersampling: map pairs of framebuffer rows straight
/// into (top, bottom) cell colors.
pub fn map_rows_to_cells(
    fb: &[[u8; 3]],
    ss_width: usize,
    ss_height: usize,
    term_cols: usize,
    term_rows: usize,
) -> Vec<HalfblockCell> {
    let mut out = vec![([0u8; 3], [0u8; 3]); term_cols * term_rows];
    for term_row in 0..term_rows {
        let top_y = term_row * 2;
        let bot_y = top_y + 1;
        for x in 0..term_cols {
            let top = fb[top_y * ss_width + x];
            let bot = if bot_y < ss_height {
                fb[bot_y * ss_width + x]
            } else {
                [0, 0, 0]
            };
            out[term_row * term_cols + x] = (top, bot);
        }
    }
    out
}

/// Box-filter downsample of a supersampled framebuffer into terminal cells.
pub fn downsample_to_terminal(
    fb: &[[u8; 3]],
    ss_width: usize,
    ss_height: usize,
    term_cols: usize,
    term_rows: usize,
    ss: usize,
) -> Vec<HalfblockCell> {
    let mut out = vec![([0u8; 3], [0u8; 3]); term_cols * term_rows];

    for term_row in 0..term_rows {
        for term_col in 0..term_cols {
            let x0 = term_col * ss;
            let x1 = ((term_col + 1) * ss).min(ss_width);
            let top_y0 = term_row * 2 * ss;
            let top_y1 = (term_row * 2 * ss + ss).min(ss_height);
            let bot_y0 = (term_row * 2 * ss + ss).min(ss_height);
            let bot_y1 = ((term_row + 1) * 2 * ss).min(ss_height);

            let average = |y0: usize, y1: usize| -> [u8; 3] {
                let mut r = 0u32;
                let mut g = 0u32;
                let mut b = 0u32;
                let mut count = 0u32;
                for y in y0..y1 {
                    for x in x0..x1 {
                        let p = fb[y * ss_width + x];
                        r += p[0] as u32;
                        g += p[1] as u32;
                        b += p[2] as u32;
                        count += 1;
                    }
                }
                if count == 0 {
                    return [0, 0, 0];
                }
                [(r / count) as u8, (g / count) as u8, (b / count) as u8]
            };

            out[term_row * term_cols + term_col] = (average(top_y0, top_y1), average(bot_y0, bot_y1));
        }
    }

    out
}

/// Write the cell grid as half-block glyphs, skipping HUD overlay rows and
/// eliding redundant color changes.
pub fn emit_cells(
    cells: &[HalfblockCell],
    term_cols: usize,
    term_rows: usize,
    show_hud: bool,
    use_truecolor: bool,
    stdout: &mut impl Write,
) -> io::Result<()> {
    let mut last_bg: Option<(u8, u8, u8)> = None;
    let mut last_fg: Option<(u8, u8, u8)> = None;

    for term_row in 0..term_rows {
        if is_hud_overlay_row(show_hud, term_row, term_rows) {
            last_bg = None;
            last_fg = None;
            continue;
        }

        queue!(stdout, cursor::MoveTo(0, term_row as u16))?;
        for x in 0..term_cols {
            let (top, bottom) = cells[term_row * term_cols + x];
            let bg = (top[0], top[1], top[2]);
            let fg = (bottom[0], bottom[1], bottom[2]);

            if last_bg != Some(bg) {
                queue!(
                    stdout,
                    SetBackgroundColor(make_color(bg.0, bg.1, bg.2, use_truecolor))
                )?;
                last_bg = Some(bg);
            }
            if last_fg != Some(fg) {
                queue!(
                    stdout,
                    SetForegroundColor(make_color(fg.0, fg.1, fg.2, use_truecolor))
                )?;
                last_fg = Some(fg);
            }
            queue!(stdout, Print(HALF_BLOCK))?;
        }
    }

    Ok(())
}

pub fn is_hud_overlay_row(show_hud: bool, row: usize, term_rows: usize) -> bool {
    show_hud && (row == 0 || row == term_rows.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_mapping_pairs_rows() {
        // 2x4 framebuffer: rows alternate red/blue.
        let fb = vec![
            [255, 0, 0],
            [255, 0, 0],
            [0, 0, 255],
            [0, 0, 255],
            [255, 0, 0],
            [255, 0, 0],
            [0, 0, 255],
            [0, 0, 255],
        ];
        let cells = map_rows_to_cells(&fb, 2, 4, 2, 2);
        assert_eq!(cells[0], ([255, 0, 0], [0, 0, 255]));
        assert_eq!(cells[3], ([255, 0, 0], [0, 0, 255]));
    }

    #[test]
    fn downsample_averages_blocks() {
        // 2x supersampling, a single cell covering a 2x4 pixel area.
        let fb = vec![[100, 0, 0]; 2 * 4];
        let cells = downsample_to_terminal(&fb, 2, 4, 1, 1, 2);
        assert_eq!(cells[0], ([100, 0, 0], [100, 0, 0]));
    }

    #[test]
    fn hud_rows_are_first_and_last() {
        assert!(is_hud_overlay_row(true, 0, 10));
        assert!(is_hud_overlay_row(true, 9, 10));
        assert!(!is_hud_overlay_row(true, 5, 10));
        assert!(!is_hud_overlay_row(false, 0, 10));
    }
}
