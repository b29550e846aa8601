//! Static advance-width table for the resume template's body font.
//!
//! Widths are in em units. `widths[i]` is the advance of ASCII character `(i + 32)`,
//! covering 0x20 (space) through 0x7E (~). Non-ASCII falls back to `average_char_width`.

#[derive(Debug)]
pub struct FontMetricTable {
    widths: [f32; 95],
    pub average_char_width: f32,
}

impl FontMetricTable {
    /// Rendered width of a single line of text, in em.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars()
            .map(|c| {
                let code = c as usize;
                if (32..=126).contains(&code) {
                    self.widths[code - 32]
                } else {
                    self.average_char_width
                }
            })
            .sum()
    }
}

/// Arial shares Helvetica's advance widths.
pub static ARIAL: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp     !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.278, 0.355, 0.556, 0.556, 0.889, 0.667, 0.191, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0-9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.584, 0.584, 0.584, 0.556, 1.015,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.667, 0.667, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.500, 0.667, 0.556, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.278, 0.278, 0.278, 0.469, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.556, 0.500, 0.556, 0.556, 0.278, 0.556, 0.556, 0.222, 0.222, 0.500, 0.222, 0.833,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.556, 0.556, 0.556, 0.556, 0.333, 0.500, 0.278, 0.556, 0.500, 0.722, 0.500, 0.500, 0.500,
        // {      |      }      ~
        0.334, 0.260, 0.334, 0.584,
    ],
    average_char_width: 0.53,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_empty_is_zero() {
        assert_eq!(ARIAL.measure_str(""), 0.0);
    }

    #[test]
    fn test_measure_ascii_word() {
        // S(0.667) + Q(0.778) + L(0.556) = 2.001
        let width = ARIAL.measure_str("SQL");
        assert!((width - 2.001).abs() < 1e-3, "got {width}");
    }

    #[test]
    fn test_non_ascii_uses_average() {
        assert!((ARIAL.measure_str("é") - ARIAL.average_char_width).abs() < 1e-6);
    }

    #[test]
    fn test_narrow_letters_measure_less_than_wide() {
        assert!(ARIAL.measure_str("illi") < ARIAL.measure_str("MWMW"));
    }
}
