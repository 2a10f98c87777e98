//! Content-stream text interpreter.
//!
//! Walks a page's decoded operators with a simplified text-rendering state
//! machine and emits one [`TextFragment`] per shown string.  Each fragment's
//! `transform` is the text rendering matrix, so `transform[4]`/`transform[5]`
//! are the baseline origin in page space.
//!
//! | Operator            | Action |
//! |---------------------|--------|
//! | `q` / `Q` / `cm`    | Save, restore, concatenate the CTM |
//! | `BT` / `ET`         | Begin / end text object |
//! | `Tf`                | Set font and size |
//! | `Tm`                | Set text matrix |
//! | `Td` / `TD` / `T*`  | Move to a new line |
//! | `TL` `Tc` `Tw` `Tz` `Ts` | Leading, spacing, scaling, rise |
//! | `Tj` / `TJ` / `'` / `"` | Show text |

use crate::backend::{decode_with_encoding, ContentOp, FontInfo, PdfValue};

/// Rough glyph advance as a fraction of the font size; real widths arrays
/// are not consulted.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Kerning (in text space) beyond this fraction of a glyph reads as a word gap.
const WORD_GAP_RATIO: f32 = 0.3;

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// A shown string with its rendering matrix and estimated extent.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    /// `[a, b, c, d, e, f]`; `e`/`f` are the baseline origin.
    pub transform: [f32; 6],
    pub width: f32,
    pub height: f32,
}

/// `m1 × m2` for PDF row-vector affine matrices.
pub fn multiply(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

#[derive(Debug, Clone)]
struct TextState {
    ctm: [f32; 6],
    encoding: Option<String>,
    font_size: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            encoding: None,
            font_size: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    /// Text rendering matrix: `[fs·Th 0 0 fs 0 rise] × Tm × CTM`.
    fn rendering_matrix(&self) -> [f32; 6] {
        let params = [
            self.font_size * self.horiz_scale,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.text_rise,
        ];
        multiply(&params, &multiply(&self.text_matrix, &self.ctm))
    }

    /// Rendered glyph height on the page.
    fn effective_font_size(&self) -> f32 {
        let m = multiply(&self.text_matrix, &self.ctm);
        (self.font_size * (m[1].powi(2) + m[3].powi(2)).sqrt()).abs()
    }

    /// Rendered width of `text` on the page.
    fn estimate_width(&self, text: &str) -> f32 {
        let m = multiply(&self.text_matrix, &self.ctm);
        let horizontal = (m[0].powi(2) + m[1].powi(2)).sqrt();
        text.chars().count() as f32
            * self.font_size
            * APPROX_CHAR_WIDTH_RATIO
            * self.horiz_scale
            * horizontal
    }

    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    fn advance_after_show(&mut self, text: &str) {
        let glyph = self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale;
        let dx: f32 = text
            .chars()
            .map(|ch| {
                let spacing = if ch == ' ' { self.word_spacing } else { 0.0 };
                glyph + self.char_spacing + spacing
            })
            .sum();
        self.advance_x(dx);
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    fn decode(&self, operand: &PdfValue) -> String {
        match operand {
            PdfValue::Str(bytes) => decode_with_encoding(bytes, self.encoding.as_deref()),
            _ => String::new(),
        }
    }
}

fn numbers<const N: usize>(operands: &[PdfValue]) -> Option<[f32; N]> {
    if operands.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(operands) {
        *slot = value.as_number()?;
    }
    Some(out)
}

/// Interpret `ops` and collect the fragments they show.
pub fn extract_fragments(ops: &[ContentOp], fonts: &[FontInfo]) -> Vec<TextFragment> {
    let mut state = TextState::default();
    let mut saved: Vec<[f32; 6]> = Vec::new();
    let mut fragments = Vec::new();

    for op in ops {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = numbers::<6>(operands) {
                    state.ctm = multiply(&m, &state.ctm);
                }
            }

            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            // Font state survives ET.
            "ET" => {}

            "Tf" => set_font(operands, fonts, &mut state),
            "Tm" => {
                if let Some(m) = numbers::<6>(operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "T*" => state.next_line(),
            "TL" => {
                if let Some([v]) = numbers::<1>(operands) {
                    state.leading = v;
                }
            }
            "Tc" => {
                if let Some([v]) = numbers::<1>(operands) {
                    state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some([v]) = numbers::<1>(operands) {
                    state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some([v]) = numbers::<1>(operands) {
                    state.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some([v]) = numbers::<1>(operands) {
                    state.text_rise = v;
                }
            }

            "Tj" => {
                if let Some(first) = operands.first() {
                    let text = state.decode(first);
                    show(text, &mut state, &mut fragments);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(items)) = operands.first() {
                    show_array(items, &mut state, &mut fragments);
                }
            }
            "'" => {
                state.next_line();
                if let Some(first) = operands.first() {
                    let text = state.decode(first);
                    show(text, &mut state, &mut fragments);
                }
            }
            "\"" => {
                if operands.len() >= 3 {
                    if let Some(aw) = operands[0].as_number() {
                        state.word_spacing = aw;
                    }
                    if let Some(ac) = operands[1].as_number() {
                        state.char_spacing = ac;
                    }
                    state.next_line();
                    let text = state.decode(&operands[2]);
                    show(text, &mut state, &mut fragments);
                }
            }

            _ => {}
        }
    }

    fragments
}

fn set_font(operands: &[PdfValue], fonts: &[FontInfo], state: &mut TextState) {
    if operands.len() < 2 {
        return;
    }
    let key = match &operands[0] {
        PdfValue::Name(n) | PdfValue::Str(n) => n.clone(),
        _ => return,
    };
    state.font_size = operands[1].as_number().unwrap_or(0.0);
    state.encoding = fonts
        .iter()
        .find(|f| f.key == key)
        .and_then(|f| f.encoding.clone());
}

fn push_fragment(text: &str, transform: [f32; 6], state: &TextState, out: &mut Vec<TextFragment>) {
    out.push(TextFragment {
        text: text.to_string(),
        transform,
        width: state.estimate_width(text),
        height: state.effective_font_size(),
    });
}

fn show(text: String, state: &mut TextState, out: &mut Vec<TextFragment>) {
    if text.is_empty() {
        return;
    }
    let transform = state.rendering_matrix();
    push_fragment(&text, transform, state, out);
    state.advance_after_show(&text);
}

/// `TJ`: strings interleaved with kerning in thousandths of text space.
/// Contiguous strings become one fragment; wide gaps turn into spaces.
fn show_array(items: &[PdfValue], state: &mut TextState, out: &mut Vec<TextFragment>) {
    let mut buf = String::new();
    let mut start = state.rendering_matrix();

    for item in items {
        match item {
            PdfValue::Str(_) => {
                let piece = state.decode(item);
                if buf.is_empty() {
                    start = state.rendering_matrix();
                }
                buf.push_str(&piece);
                state.advance_after_show(&piece);
            }
            other => {
                if let Some(adjust) = other.as_number() {
                    let dx = -adjust / 1000.0 * state.font_size * state.horiz_scale;
                    let gap = state.font_size * APPROX_CHAR_WIDTH_RATIO * state.horiz_scale * WORD_GAP_RATIO;
                    if dx > gap && !buf.is_empty() {
                        buf.push(' ');
                    }
                    state.advance_x(dx);
                }
            }
        }
    }

    let text = buf.trim_end();
    if !text.is_empty() {
        push_fragment(text, start, state, out);
    }
}
