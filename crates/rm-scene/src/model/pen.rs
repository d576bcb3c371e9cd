//! Drawing tools and ink colors.
//!
//! Codes are a closed, versioned table. Codes this crate does not know decode
//! to `Unknown(code)` so that newer files still load.

/// Drawing instrument of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pen {
    Paintbrush1,
    Pencil1,
    Ballpoint1,
    Marker1,
    Fineliner1,
    Highlighter1,
    Eraser,
    MechanicalPencil1,
    EraseArea,
    Paintbrush2,
    MechanicalPencil2,
    Pencil2,
    Ballpoint2,
    Marker2,
    Fineliner2,
    Highlighter2,
    Calligraphy,
    Shader,
    Unknown(u32),
}

impl Pen {
    /// Creates a Pen from its wire code.
    pub fn from_u32(code: u32) -> Pen {
        match code {
            0 => Pen::Paintbrush1,
            1 => Pen::Pencil1,
            2 => Pen::Ballpoint1,
            3 => Pen::Marker1,
            4 => Pen::Fineliner1,
            5 => Pen::Highlighter1,
            6 => Pen::Eraser,
            7 => Pen::MechanicalPencil1,
            8 => Pen::EraseArea,
            12 => Pen::Paintbrush2,
            13 => Pen::MechanicalPencil2,
            14 => Pen::Pencil2,
            15 => Pen::Ballpoint2,
            16 => Pen::Marker2,
            17 => Pen::Fineliner2,
            18 => Pen::Highlighter2,
            21 => Pen::Calligraphy,
            23 => Pen::Shader,
            other => Pen::Unknown(other),
        }
    }

    /// Returns the wire code.
    pub fn code(self) -> u32 {
        match self {
            Pen::Paintbrush1 => 0,
            Pen::Pencil1 => 1,
            Pen::Ballpoint1 => 2,
            Pen::Marker1 => 3,
            Pen::Fineliner1 => 4,
            Pen::Highlighter1 => 5,
            Pen::Eraser => 6,
            Pen::MechanicalPencil1 => 7,
            Pen::EraseArea => 8,
            Pen::Paintbrush2 => 12,
            Pen::MechanicalPencil2 => 13,
            Pen::Pencil2 => 14,
            Pen::Ballpoint2 => 15,
            Pen::Marker2 => 16,
            Pen::Fineliner2 => 17,
            Pen::Highlighter2 => 18,
            Pen::Calligraphy => 21,
            Pen::Shader => 23,
            Pen::Unknown(code) => code,
        }
    }

    /// Static stroke style for this tool.
    pub fn style(self) -> ToolStyle {
        match self {
            Pen::Fineliner1 | Pen::Fineliner2 => ToolStyle::new(1.0, 1.8, LineCap::Round),
            Pen::Ballpoint1 | Pen::Ballpoint2 => ToolStyle::new(1.0, 1.0, LineCap::Round),
            Pen::Marker1 | Pen::Marker2 => ToolStyle::new(1.0, 1.2, LineCap::Round),
            Pen::Pencil1 | Pen::Pencil2 => ToolStyle::new(0.9, 1.0, LineCap::Round),
            Pen::MechanicalPencil1 | Pen::MechanicalPencil2 => {
                ToolStyle::new(0.7, 1.0, LineCap::Round)
            }
            Pen::Paintbrush1 | Pen::Paintbrush2 => ToolStyle::new(1.0, 1.0, LineCap::Round),
            Pen::Calligraphy => ToolStyle::new(1.0, 1.0, LineCap::Round),
            Pen::Highlighter1 | Pen::Highlighter2 => ToolStyle::new(0.3, 15.0, LineCap::Square),
            Pen::Shader => ToolStyle::new(0.1, 12.0, LineCap::Round),
            Pen::Eraser => ToolStyle::new(1.0, 2.0, LineCap::Square),
            Pen::EraseArea => ToolStyle::new(0.0, 1.0, LineCap::Square),
            Pen::Unknown(_) => ToolStyle::new(1.0, 1.0, LineCap::Round),
        }
    }

    /// Returns true for tools that remove ink rather than add it.
    pub fn is_eraser(self) -> bool {
        matches!(self, Pen::Eraser | Pen::EraseArea)
    }
}

/// Stroke end cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Round,
    Square,
}

/// Per-tool rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolStyle {
    /// Base stroke opacity in `[0, 1]`.
    pub opacity: f32,
    /// Multiplier applied to the line's thickness scale.
    pub width_factor: f32,
    pub cap: LineCap,
}

impl ToolStyle {
    const fn new(opacity: f32, width_factor: f32, cap: LineCap) -> Self {
        Self {
            opacity,
            width_factor,
            cap,
        }
    }
}

/// Ink color of a stroke or highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PenColor {
    Black,
    Gray,
    White,
    Yellow,
    Green,
    Pink,
    Blue,
    Red,
    GrayOverlap,
    Highlight,
    Green2,
    Cyan,
    Magenta,
    Yellow2,
    Unknown(u32),
}

impl PenColor {
    /// Creates a PenColor from its wire code.
    pub fn from_u32(code: u32) -> PenColor {
        match code {
            0 => PenColor::Black,
            1 => PenColor::Gray,
            2 => PenColor::White,
            3 => PenColor::Yellow,
            4 => PenColor::Green,
            5 => PenColor::Pink,
            6 => PenColor::Blue,
            7 => PenColor::Red,
            8 => PenColor::GrayOverlap,
            9 => PenColor::Highlight,
            10 => PenColor::Green2,
            11 => PenColor::Cyan,
            12 => PenColor::Magenta,
            13 => PenColor::Yellow2,
            other => PenColor::Unknown(other),
        }
    }

    /// Returns the wire code.
    pub fn code(self) -> u32 {
        match self {
            PenColor::Black => 0,
            PenColor::Gray => 1,
            PenColor::White => 2,
            PenColor::Yellow => 3,
            PenColor::Green => 4,
            PenColor::Pink => 5,
            PenColor::Blue => 6,
            PenColor::Red => 7,
            PenColor::GrayOverlap => 8,
            PenColor::Highlight => 9,
            PenColor::Green2 => 10,
            PenColor::Cyan => 11,
            PenColor::Magenta => 12,
            PenColor::Yellow2 => 13,
            PenColor::Unknown(code) => code,
        }
    }

    /// sRGB triple used when drawing this color. Unknown colors draw black.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            PenColor::Black | PenColor::Unknown(_) => [0, 0, 0],
            PenColor::Gray | PenColor::GrayOverlap => [144, 144, 144],
            PenColor::White => [255, 255, 255],
            PenColor::Yellow => [251, 247, 25],
            PenColor::Green => [0, 255, 0],
            PenColor::Pink => [255, 192, 203],
            PenColor::Blue => [78, 105, 201],
            PenColor::Red => [179, 62, 57],
            PenColor::Highlight => [255, 237, 117],
            PenColor::Green2 => [161, 216, 125],
            PenColor::Cyan => [139, 208, 229],
            PenColor::Magenta => [183, 130, 205],
            PenColor::Yellow2 => [247, 232, 81],
        }
    }

    /// Formats the color as `#rrggbb`.
    pub fn hex(self) -> String {
        let [r, g, b] = self.rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pen_codes_roundtrip() {
        for code in 0..32u32 {
            assert_eq!(Pen::from_u32(code).code(), code);
            assert_eq!(PenColor::from_u32(code).code(), code);
        }
    }

    #[test]
    fn test_unknown_codes_are_preserved() {
        assert_eq!(Pen::from_u32(99), Pen::Unknown(99));
        assert_eq!(PenColor::from_u32(42), PenColor::Unknown(42));
        assert_eq!(PenColor::Unknown(42).rgb(), [0, 0, 0]);
    }

    #[test]
    fn test_highlighter_style() {
        let style = Pen::Highlighter2.style();
        assert!(style.opacity < 1.0);
        assert_eq!(style.cap, LineCap::Square);
        assert!(Pen::EraseArea.is_eraser());
        assert!(!Pen::Fineliner1.is_eraser());
    }

    #[test]
    fn test_hex() {
        assert_eq!(PenColor::Black.hex(), "#000000");
        assert_eq!(PenColor::White.hex(), "#ffffff");
    }
}
