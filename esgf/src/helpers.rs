/// Make sure bounds are ordered correctly, eg the upper bound of a label range isn't below the
/// lower one.
///
pub fn rearrange<N>(lower: N, upper: N) -> (N, N)
where
    N: PartialOrd,
{
    if lower > upper {
        (upper, lower)
    } else {
        (lower, upper)
    }
}
