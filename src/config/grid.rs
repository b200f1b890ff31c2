use serde::{Deserialize, Serialize};

/// Grid flavors the viewer can connect to. The flavor decides which world
/// limits apply before the simulator tells us otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grid {
    /// Main SecondLife grid (Agni)
    SecondLife,
    /// SecondLife beta grid (Aditi)
    SecondLifeBeta,
    /// OpenSimulator grid
    OpenSimulator {
        name: String,
        login_uri: String,
    },
    /// Custom grid, treated like OpenSimulator for limits
    Custom {
        name: String,
        login_uri: String,
    },
}

impl Grid {
    pub fn name(&self) -> &str {
        match self {
            Grid::SecondLife => "Second Life",
            Grid::SecondLifeBeta => "Second Life Beta",
            Grid::OpenSimulator { name, .. } => name,
            Grid::Custom { name, .. } => name,
        }
    }

    pub fn login_uri(&self) -> &str {
        match self {
            Grid::SecondLife => "https://login.agni.lindenlab.com/cgi-bin/login.cgi",
            Grid::SecondLifeBeta => "https://login.aditi.lindenlab.com/cgi-bin/login.cgi",
            Grid::OpenSimulator { login_uri, .. } => login_uri,
            Grid::Custom { login_uri, .. } => login_uri,
        }
    }

    /// True for the Linden Lab grids, whose limits are fixed
    pub fn is_second_life(&self) -> bool {
        matches!(self, Grid::SecondLife | Grid::SecondLifeBeta)
    }

    /// Parse grid from name string
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "secondlife" | "sl" | "agni" => Some(Grid::SecondLife),
            "secondlife-beta" | "sl-beta" | "aditi" => Some(Grid::SecondLifeBeta),
            _ => None,
        }
    }

    /// Create a custom OpenSimulator grid
    pub fn opensim(name: String, login_uri: String) -> Self {
        Grid::OpenSimulator { name, login_uri }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Grid::SecondLife
    }
}

impl std::fmt::Display for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
