use std::fmt;

use crate::Dense3DArray;

/// Renders the array layer by layer, reading the flat buffer as interleaved
/// `(re im)` pairs.
///
/// Every x-layer starts with a `[i,:,:]:` header. Each z-row ends with a
/// newline, as does each layer, and one more newline closes the output.
impl<T: fmt::Display> fmt::Display for Dense3DArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [n_x, n_y, n_z] = self.dims();
        let mut counter = 0usize;
        for i in 0..n_x {
            writeln!(f, "[{i},:,:]:")?;
            for j in 0..n_y {
                for element in self.vector_z(i, j) {
                    if counter % 2 == 0 {
                        write!(f, "({element} ")?;
                    } else {
                        write!(f, "{element}) ")?;
                    }
                    counter += 1;
                }
                writeln!(f)?;
            }
            writeln!(f)?;
        }
        writeln!(f)
    }
}
