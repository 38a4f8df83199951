use serde::{Deserialize, Serialize};

use super::{project_pinhole_family, ModelError, ParamLayout};
use crate::{Pose, Pt3, Real, Vec2, Vec3};

/// Discriminant of [`CameraModel`], used where only the model family matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraModelKind {
    Pinhole,
    PinholeRadialK1,
    PinholeRadialK3,
    PinholeBrownT2,
    PinholeFisheye,
    PinholeFisheye1,
    Spherical,
}

impl CameraModelKind {
    /// Parameter layout, or `None` for models without a refinable parameter vector.
    pub fn layout(self) -> Option<ParamLayout> {
        let dim = match self {
            Self::Pinhole => 3,
            Self::PinholeRadialK1 => 4,
            Self::PinholeRadialK3 => 6,
            Self::PinholeBrownT2 => 8,
            Self::PinholeFisheye => 7,
            Self::PinholeFisheye1 => 4,
            Self::Spherical => return None,
        };
        Some(ParamLayout { dim })
    }

    /// Whether a reprojection residual exists for this model.
    pub fn has_residual(self) -> bool {
        self.layout().is_some()
    }
}

/// Camera projection model with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraModel {
    Pinhole {
        focal: Real,
        ppx: Real,
        ppy: Real,
    },
    PinholeRadialK1 {
        focal: Real,
        ppx: Real,
        ppy: Real,
        k1: Real,
    },
    PinholeRadialK3 {
        focal: Real,
        ppx: Real,
        ppy: Real,
        k1: Real,
        k2: Real,
        k3: Real,
    },
    PinholeBrownT2 {
        focal: Real,
        ppx: Real,
        ppy: Real,
        k1: Real,
        k2: Real,
        k3: Real,
        t1: Real,
        t2: Real,
    },
    /// Kannala-Brandt fisheye.
    PinholeFisheye {
        focal: Real,
        ppx: Real,
        ppy: Real,
        k1: Real,
        k2: Real,
        k3: Real,
        k4: Real,
    },
    /// Field-of-view fisheye.
    PinholeFisheye1 {
        focal: Real,
        ppx: Real,
        ppy: Real,
        k1: Real,
    },
    /// Equirectangular panorama. Not refinable.
    Spherical,
}

impl CameraModel {
    pub fn kind(&self) -> CameraModelKind {
        match self {
            Self::Pinhole { .. } => CameraModelKind::Pinhole,
            Self::PinholeRadialK1 { .. } => CameraModelKind::PinholeRadialK1,
            Self::PinholeRadialK3 { .. } => CameraModelKind::PinholeRadialK3,
            Self::PinholeBrownT2 { .. } => CameraModelKind::PinholeBrownT2,
            Self::PinholeFisheye { .. } => CameraModelKind::PinholeFisheye,
            Self::PinholeFisheye1 { .. } => CameraModelKind::PinholeFisheye1,
            Self::Spherical => CameraModelKind::Spherical,
        }
    }

    /// Flatten into `[focal, ppx, ppy, distortion...]`. Empty for [`CameraModel::Spherical`].
    pub fn params(&self) -> Vec<Real> {
        match *self {
            Self::Pinhole { focal, ppx, ppy } => vec![focal, ppx, ppy],
            Self::PinholeRadialK1 {
                focal,
                ppx,
                ppy,
                k1,
            } => vec![focal, ppx, ppy, k1],
            Self::PinholeRadialK3 {
                focal,
                ppx,
                ppy,
                k1,
                k2,
                k3,
            } => vec![focal, ppx, ppy, k1, k2, k3],
            Self::PinholeBrownT2 {
                focal,
                ppx,
                ppy,
                k1,
                k2,
                k3,
                t1,
                t2,
            } => vec![focal, ppx, ppy, k1, k2, k3, t1, t2],
            Self::PinholeFisheye {
                focal,
                ppx,
                ppy,
                k1,
                k2,
                k3,
                k4,
            } => vec![focal, ppx, ppy, k1, k2, k3, k4],
            Self::PinholeFisheye1 {
                focal,
                ppx,
                ppy,
                k1,
            } => vec![focal, ppx, ppy, k1],
            Self::Spherical => Vec::new(),
        }
    }

    /// Rebuild a model of `kind` from a flat parameter vector.
    pub fn from_params(kind: CameraModelKind, p: &[Real]) -> Result<Self, ModelError> {
        let expected = kind.layout().map_or(0, |l| l.dim);
        if p.len() != expected {
            return Err(ModelError::ParamCount {
                kind,
                expected,
                actual: p.len(),
            });
        }
        let model = match kind {
            CameraModelKind::Pinhole => Self::Pinhole {
                focal: p[0],
                ppx: p[1],
                ppy: p[2],
            },
            CameraModelKind::PinholeRadialK1 => Self::PinholeRadialK1 {
                focal: p[0],
                ppx: p[1],
                ppy: p[2],
                k1: p[3],
            },
            CameraModelKind::PinholeRadialK3 => Self::PinholeRadialK3 {
                focal: p[0],
                ppx: p[1],
                ppy: p[2],
                k1: p[3],
                k2: p[4],
                k3: p[5],
            },
            CameraModelKind::PinholeBrownT2 => Self::PinholeBrownT2 {
                focal: p[0],
                ppx: p[1],
                ppy: p[2],
                k1: p[3],
                k2: p[4],
                k3: p[5],
                t1: p[6],
                t2: p[7],
            },
            CameraModelKind::PinholeFisheye => Self::PinholeFisheye {
                focal: p[0],
                ppx: p[1],
                ppy: p[2],
                k1: p[3],
                k2: p[4],
                k3: p[5],
                k4: p[6],
            },
            CameraModelKind::PinholeFisheye1 => Self::PinholeFisheye1 {
                focal: p[0],
                ppx: p[1],
                ppy: p[2],
                k1: p[3],
            },
            CameraModelKind::Spherical => Self::Spherical,
        };
        Ok(model)
    }
}

/// Camera intrinsic: image size plus projection model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsic {
    pub width: u32,
    pub height: u32,
    pub model: CameraModel,
}

impl Intrinsic {
    pub fn new(width: u32, height: u32, model: CameraModel) -> Self {
        Self {
            width,
            height,
            model,
        }
    }

    /// Project a camera-frame point to pixels.
    ///
    /// Returns `None` for pinhole-family points at or behind the camera center.
    pub fn project(&self, p_c: &Vec3) -> Option<Vec2> {
        if let CameraModel::Spherical = self.model {
            return Some(self.project_spherical(p_c));
        }
        if p_c.z <= 0.0 {
            return None;
        }
        project_pinhole_family(self.model.kind(), &self.model.params(), p_c)
    }

    /// Pixel residual `project(pose * p_w) - observed`.
    pub fn residual(&self, pose: &Pose, p_w: &Pt3, observed: &Vec2) -> Option<Vec2> {
        let p_c = pose.transform_point(p_w);
        self.project(&p_c.coords).map(|uv| uv - observed)
    }

    fn project_spherical(&self, p_c: &Vec3) -> Vec2 {
        let lon = p_c.x.atan2(p_c.z);
        let lat = (-p_c.y).atan2(p_c.x.hypot(p_c.z));
        let w = self.width as Real;
        let h = self.height as Real;
        let size = w.max(h);
        let tau = std::f64::consts::TAU;
        Vec2::new(lon / tau * size + w / 2.0, -lat / tau * size + h / 2.0)
    }
}
