/// Packed 0xRRGGBB color used for states the palette does not cover.
pub const FALLBACK_COLOR: u32 = 0xffffff;

/// Color table indexed by cell state. State 0 is never drawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<u32>,
}

impl Palette {
    pub fn new(colors: Vec<u32>) -> Self {
        Self {
            colors: colors.into_iter().map(|c| c & 0xffffff).collect(),
        }
    }

    /// Alive cells get `from`; refractory states fade linearly towards `to`.
    pub fn gradient(state_count: u32, from: u32, to: u32) -> Self {
        let mut colors = vec![0, from];
        let refractory = state_count.saturating_sub(2);
        for i in 0..refractory {
            // Highest refractory state is the one right after death, so it sits closest to `from`.
            let t = (i + 1) as f32 / (refractory + 1) as f32;
            colors.push(lerp_rgb(to, from, t));
        }
        Self::new(colors)
    }

    pub fn color(&self, state: u32) -> u32 {
        self.colors
            .get(state as usize)
            .copied()
            .unwrap_or(FALLBACK_COLOR)
    }

    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

fn lerp_rgb(a: u32, b: u32, t: f32) -> u32 {
    let channel = |shift: u32| {
        let a = ((a >> shift) & 0xff) as f32;
        let b = ((b >> shift) & 0xff) as f32;
        ((a + (b - a) * t).round() as u32).min(0xff) << shift
    };
    channel(16) | channel(8) | channel(0)
}
