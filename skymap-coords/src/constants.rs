/// Rotation matrix for transforming Galactic coordinates to ICRS.
///
/// This matrix represents the transformation from the IAU 1958 Galactic coordinate system
/// to the International Celestial Reference System (ICRS). The matrix is derived from
/// the IAU-defined Galactic pole and zero-point:
/// - North Galactic Pole (NGP): RA = 192.859508°, Dec = 27.128336° (J2000/ICRS)
/// - Galactic Center direction: l=0°, b=0° points toward RA = 266.405°, Dec = -28.936° (J2000)
///
/// Rows are the galactic axes expressed in ICRS, so `gal = M · icrs` and
/// `icrs = Mᵀ · gal`.
///
/// Reference: Liu, J.-C., Zhu, Z., & Zhang, H. (2011). "Reconsidering the Galactic
/// coordinate system". Astronomy & Astrophysics, 526, A16.
#[allow(clippy::excessive_precision)]
pub const GALACTIC_TO_ICRS: [[f64; 3]; 3] = [
    [
        -0.054875560416215368492398900454,
        -0.873437090234885048760383168409,
        -0.483835015548713226831774175116,
    ],
    [
        0.494109427875583673525222371358,
        -0.444829629960011178146614061616,
        0.746982244497218890527388004556,
    ],
    [
        -0.867666149019004701181616534570,
        -0.198076373431201528180486091412,
        0.455983776175066922272100478348,
    ],
];

#[allow(clippy::excessive_precision)]
#[allow(clippy::approx_constant)]
pub const PI: f64 = 3.141592653589793238462643;

#[allow(clippy::excessive_precision)]
#[allow(clippy::approx_constant)]
pub const HALF_PI: f64 = 1.5707963267948966192313216;

#[allow(clippy::excessive_precision)]
#[allow(clippy::approx_constant)]
pub const TWOPI: f64 = 6.283185307179586476925287;

#[allow(clippy::excessive_precision)]
pub const DEG_TO_RAD: f64 = 1.745329251994329576923691e-2;

#[allow(clippy::excessive_precision)]
pub const RAD_TO_DEG: f64 = 57.29577951308232087679815;
